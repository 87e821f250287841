//! `DISACTIVATE_ROOM`: the text is the code (or id) of the room to close.
//!
//! Every active participant is removed from the room and told about it.
//! Notifying a member is best effort; the room stays closed either way.

use super::{Context, log_side_effect_failure};
use crate::delivery::OutboundMessage;
use crate::error::{HandlerResult, InvalidInput};
use crate::state::ConversationStatus;
use futures_util::future::join_all;
use tracing::info;

pub(super) async fn handle(ctx: &Context<'_>) -> HandlerResult {
    let input = ctx.text()?;
    let rooms = ctx.relay.db.rooms();

    let room = match rooms.find_by_code(input).await? {
        Some(room) => room,
        None => rooms
            .find(input)
            .await?
            .ok_or_else(|| InvalidInput::UnknownRoom(input.to_string()))?,
    };

    let (room, members) = rooms.deactivate(&room.id).await?;
    let evictions = members
        .iter()
        .map(|user_id| evict(ctx, &room.id, &room.title, user_id));
    for (user_id, result) in members.iter().zip(join_all(evictions).await) {
        if let Err(e) = result {
            log_side_effect_failure("evict member of closed room", user_id, &e);
        }
    }
    crate::metrics::remove_room_metrics(&room.id);

    ctx.set_status(ConversationStatus::Free).await?;
    info!(
        admin = %ctx.user_id(),
        room_id = %room.id,
        code = %room.code,
        evicted = members.len(),
        "Room disactivated"
    );

    ctx.reply(format!(
        "Room {} with code {} disactivated successfuly",
        room.title, room.code
    ));
    Ok(())
}

/// Drop one member from the room cache, free them, and tell them why.
async fn evict(ctx: &Context<'_>, room_id: &str, title: &str, user_id: &str) -> HandlerResult {
    let cache = &ctx.relay.cache;
    cache.remove_user_from_room(room_id, user_id).await?;
    cache
        .set_status(user_id, None, &ConversationStatus::Free)
        .await?;
    cache
        .set_status(user_id, Some(room_id), &ConversationStatus::Free)
        .await?;

    let producer = &ctx.relay.producer;
    producer.publish(
        OutboundMessage::text(
            producer.bot_token(),
            user_id,
            format!("Room {title} was closed by an admin. Enter /open to join another one"),
        ),
        format!("{user_id}-disactivate-{room_id}"),
    );
    Ok(())
}
