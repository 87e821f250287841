//! `INPUT_USERNAME`: the text is the username for the room being joined.
//!
//! A name held by another active participant of the same room is refused
//! with a retry prompt and nothing changes. The check runs first; the unique
//! index catches a concurrent claim that slips past it, with the same reply.

use super::Context;
use super::helpers::validate_username;
use crate::db::DbError;
use crate::error::{HandlerError, HandlerResult, InvalidInput};
use crate::state::ConversationStatus;
use tracing::info;

pub(super) async fn handle(ctx: &Context<'_>, room_id: &str) -> HandlerResult {
    let relay = ctx.relay;
    let username = validate_username(ctx.text()?, relay.settings.username_max_len)?;

    let room = match relay.db.rooms().find(room_id).await? {
        Some(room) if room.is_active => room,
        _ => {
            ctx.set_status(ConversationStatus::Free).await?;
            return Err(HandlerError::MissingContext(format!(
                "room {room_id} is gone or inactive"
            )));
        }
    };

    let participants = relay.db.participants();
    if let Some(holder) = participants.find_active_by_username(room_id, username).await?
        && holder.user_id != ctx.user_id()
    {
        return Err(InvalidInput::UsernameTaken(username.to_string()).into());
    }

    let participant = participants
        .activate(room_id, ctx.user_id(), username)
        .await
        .map_err(|e| match e {
            DbError::UsernameTaken(name) => HandlerError::from(InvalidInput::UsernameTaken(name)),
            other => HandlerError::from(other),
        })?;

    relay.cache.add_user_to_room(&participant).await?;
    ctx.set_status(ConversationStatus::Participant {
        room_id: room_id.to_string(),
    })
    .await?;
    info!(user_id = %ctx.user_id(), room_id = %room_id, username = %username, "Joined room");

    ctx.reply(format!(
        "Welcome {username} to {}\nDescription: {}",
        room.title,
        room.description.as_deref().unwrap_or("-")
    ));
    Ok(())
}
