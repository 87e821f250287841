//! `FREE`: nothing is expected from the user, input is ignored.

use super::Context;
use crate::error::HandlerResult;
use tracing::debug;

pub(super) async fn handle(ctx: &Context<'_>) -> HandlerResult {
    debug!(user_id = %ctx.user_id(), "Input while free, ignored");
    Ok(())
}
