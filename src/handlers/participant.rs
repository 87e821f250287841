//! `PARTICIPANT`: everything the user sends is relayed to the room.

use super::Context;
use super::helpers::fanout;
use crate::error::{HandlerError, HandlerResult};
use tracing::info;

pub(super) async fn handle(ctx: &Context<'_>, room_id: &str) -> HandlerResult {
    let cache = &ctx.relay.cache;

    // A sender missing from the active set means the room's cache entries
    // were lost; rebuild them before resolving recipients.
    if !cache.is_user_active_in_room(ctx.user_id(), room_id).await? {
        let restored = cache.warm_room(room_id).await?;
        info!(room_id = %room_id, restored, "Active set rebuilt from directory");
    }

    let sender = cache
        .participant(room_id, ctx.user_id())
        .await?
        .ok_or_else(|| {
            HandlerError::MissingContext(format!(
                "no active participant {} in room {room_id}",
                ctx.user_id()
            ))
        })?;

    fanout::broadcast(ctx.relay, room_id, &sender, ctx.intent).await
}
