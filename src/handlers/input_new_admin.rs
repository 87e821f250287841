//! `INPUT_NEW_ADMIN`: the text is the platform id of the user to promote.

use super::Context;
use crate::error::{HandlerResult, InvalidInput};
use crate::state::ConversationStatus;
use tracing::info;

pub(super) async fn handle(ctx: &Context<'_>) -> HandlerResult {
    let target_id = ctx.text()?;
    let users = ctx.relay.db.users();

    let target = users
        .find(target_id)
        .await?
        .ok_or_else(|| InvalidInput::UnknownUser(target_id.to_string()))?;
    if target.is_admin {
        return Err(InvalidInput::AlreadyAdmin(target.id).into());
    }

    users.set_admin(&target.id, true).await?;
    ctx.set_status(ConversationStatus::Free).await?;
    info!(admin = %ctx.user_id(), new_admin = %target.id, "Admin added");

    ctx.reply(format!(
        "Added new admin {} with ID {}",
        target.username.as_deref().unwrap_or("-"),
        target.id
    ));
    Ok(())
}
