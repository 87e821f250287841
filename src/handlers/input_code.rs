//! `INPUT_CODE`: the text is a room code.

use super::{Context, membership};
use crate::error::HandlerResult;

pub(super) async fn handle(ctx: &Context<'_>) -> HandlerResult {
    let code = ctx.text()?;
    membership::switch_room(ctx, code).await
}
