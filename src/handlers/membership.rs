//! Entering and leaving rooms.
//!
//! A user is active in at most one room. Every membership change of a user
//! runs under the `membership:{userId}` lock, so a room switch (leave the
//! current room, then enter the new one) is never interleaved with another
//! switch or exit of the same user.

use super::Context;
use crate::error::{HandlerError, HandlerResult, InvalidInput};
use crate::state::ConversationStatus;
use std::future::Future;
use tracing::info;

pub(super) const ENTER_CODE_PROMPT: &str = "Input room code";

pub(super) const EXIT_REPLY: &str = "You successuly stop chat, for listen chat again enter /start";

pub(super) const NOT_IN_ROOM_REPLY: &str = "You are not in a room. Enter /open to join one";

fn lock_key(user_id: &str) -> String {
    format!("membership:{user_id}")
}

/// Run `f` under the user's membership lock. A busy lock fails with
/// [`HandlerError::Busy`].
async fn with_membership_lock<T, F, Fut>(ctx: &Context<'_>, f: F) -> Result<T, HandlerError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, HandlerError>>,
{
    let key = lock_key(ctx.user_id());
    ctx.relay
        .locks
        .with_lock(&key, f)
        .await?
        .ok_or(HandlerError::Busy(key))
}

/// Deactivate the user's current membership, if any.
///
/// Returns the id of the room that was left. Must run under the membership lock.
async fn leave_current_room(ctx: &Context<'_>) -> Result<Option<String>, HandlerError> {
    let ConversationStatus::Participant { room_id } = ctx.settled_status().await? else {
        return Ok(None);
    };

    let relay = ctx.relay;
    relay
        .db
        .participants()
        .deactivate(&room_id, ctx.user_id())
        .await?;
    relay
        .cache
        .remove_user_from_room(&room_id, ctx.user_id())
        .await?;
    info!(user_id = %ctx.user_id(), room_id = %room_id, "Left room");
    Ok(Some(room_id))
}

/// Join the active room with `code` and ask for a username.
///
/// Must run under the membership lock.
async fn enter_room(ctx: &Context<'_>, code: &str) -> HandlerResult {
    let participant = ctx
        .relay
        .db
        .rooms()
        .add_participant(code, ctx.user_id())
        .await?
        .ok_or_else(|| InvalidInput::UnknownCode(code.to_string()))?;

    ctx.set_status(ConversationStatus::InputUsername {
        room_id: participant.room_id.clone(),
    })
    .await?;
    info!(user_id = %ctx.user_id(), room_id = %participant.room_id, "Entered room, waiting for username");

    match participant.username {
        Some(previous) => ctx.reply(format!(
            "Input username for room\nSend {previous} to reuse your last name"
        )),
        None => ctx.reply("Input username for room"),
    }
    Ok(())
}

/// `/open`: leave the current room and wait for a code.
pub(super) async fn open(ctx: &Context<'_>) -> HandlerResult {
    with_membership_lock(ctx, || async {
        leave_current_room(ctx).await?;
        ctx.set_status(ConversationStatus::InputCode).await
    })
    .await?;
    ctx.reply(ENTER_CODE_PROMPT);
    Ok(())
}

/// A code entered while in `INPUT_CODE`, or with `/start CODE`.
///
/// Switches out of the current room first. An unknown code leaves the
/// current membership untouched.
pub(super) async fn switch_room(ctx: &Context<'_>, code: &str) -> HandlerResult {
    with_membership_lock(ctx, || async {
        ctx.relay
            .db
            .rooms()
            .find_active_by_code(code)
            .await?
            .ok_or_else(|| InvalidInput::UnknownCode(code.to_string()))?;
        leave_current_room(ctx).await?;
        enter_room(ctx, code).await
    })
    .await
}

/// `/exit`, `/stop`: leave the current room.
pub(super) async fn exit(ctx: &Context<'_>) -> HandlerResult {
    let left = with_membership_lock(ctx, || async {
        let left = leave_current_room(ctx).await?;
        ctx.set_status(ConversationStatus::Free).await?;
        Ok::<_, HandlerError>(left)
    })
    .await?;

    match left {
        Some(_) => ctx.reply(EXIT_REPLY),
        None => ctx.reply(NOT_IN_ROOM_REPLY),
    }
    Ok(())
}
