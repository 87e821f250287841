//! `INPUT_NEW_ROOM`: an admin builds a room one field at a time.
//!
//! The partial room lives in the cache as a [`RoomDraft`]. The code is
//! checked under the `room-code:{code}` lock when it is entered and again
//! when the room is created, where the unique constraint has the last word.

use super::Context;
use super::helpers::validate_room_code;
use crate::cache::RoomDraft;
use crate::db::{DbError, NewRoom};
use crate::error::{HandlerError, HandlerResult, InvalidInput};
use crate::state::{ConversationStatus, NewRoomStage};
use tracing::info;

fn lock_key(code: &str) -> String {
    format!("room-code:{code}")
}

pub(super) async fn handle(ctx: &Context<'_>, stage: NewRoomStage) -> HandlerResult {
    match stage {
        NewRoomStage::Code => claim_code(ctx).await,
        NewRoomStage::Title => set_title(ctx).await,
        NewRoomStage::Description => create_room(ctx).await,
    }
}

async fn claim_code(ctx: &Context<'_>) -> HandlerResult {
    let code = validate_room_code(ctx.text()?)?;
    let key = lock_key(code);

    ctx.relay
        .locks
        .with_lock(&key, || async {
            if ctx.relay.db.rooms().find_by_code(code).await?.is_some() {
                return Err(InvalidInput::RoomCodeTaken(code.to_string()).into());
            }
            ctx.relay
                .cache
                .set_draft(
                    ctx.user_id(),
                    &RoomDraft {
                        code: Some(code.to_string()),
                        ..Default::default()
                    },
                )
                .await?;
            ctx.set_status(ConversationStatus::InputNewRoom {
                stage: NewRoomStage::Title,
            })
            .await
        })
        .await?
        .ok_or(HandlerError::Busy(key))?;

    ctx.reply("Input Title of room");
    Ok(())
}

async fn set_title(ctx: &Context<'_>) -> HandlerResult {
    let title = ctx.text()?;
    let mut draft = load_draft(ctx).await?;

    draft.title = Some(title.to_string());
    ctx.relay.cache.set_draft(ctx.user_id(), &draft).await?;
    ctx.set_status(ConversationStatus::InputNewRoom {
        stage: NewRoomStage::Description,
    })
    .await?;

    ctx.reply("Input Description of room");
    Ok(())
}

async fn create_room(ctx: &Context<'_>) -> HandlerResult {
    let description = ctx.text()?;
    let draft = load_draft(ctx).await?;
    let (Some(code), Some(title)) = (draft.code, draft.title) else {
        return Err(abandon(ctx, "room draft is incomplete").await);
    };
    let key = lock_key(&code);
    let new_room = NewRoom {
        code: code.clone(),
        title,
        description: Some(description.to_string()),
    };

    let created = ctx
        .relay
        .locks
        .with_lock(&key, || async {
            ctx.relay
                .db
                .rooms()
                .create(&new_room)
                .await
                .map_err(HandlerError::from)
        })
        .await;

    let room = match created {
        Ok(Some(room)) => room,
        Ok(None) => return Err(HandlerError::Busy(key)),
        Err(HandlerError::Db(DbError::RoomCodeTaken(code))) => {
            // Lost the code between claim and creation: ask for another one.
            ctx.set_status(ConversationStatus::InputNewRoom {
                stage: NewRoomStage::Code,
            })
            .await?;
            return Err(InvalidInput::RoomCodeTaken(code).into());
        }
        Err(e) => return Err(e),
    };

    ctx.relay.cache.clear_draft(ctx.user_id()).await?;
    ctx.set_status(ConversationStatus::Free).await?;
    info!(admin = %ctx.user_id(), room_id = %room.id, code = %room.code, "Room created");

    ctx.reply(format!(
        "Added new room {}\nDescription: {}\nCode {}\nLink: {}?start={}",
        room.title,
        room.description.as_deref().unwrap_or("-"),
        room.code,
        ctx.relay.settings.bot_url,
        room.code
    ));
    Ok(())
}

async fn load_draft(ctx: &Context<'_>) -> Result<RoomDraft, HandlerError> {
    match ctx.relay.cache.draft(ctx.user_id()).await? {
        Some(draft) => Ok(draft),
        None => Err(abandon(ctx, "room draft is missing").await),
    }
}

/// Give up on the draft and free the admin.
///
/// Returns the error to report: the missing context, or whatever failed
/// while cleaning up.
async fn abandon(ctx: &Context<'_>, reason: &str) -> HandlerError {
    let cleanup = async {
        ctx.relay.cache.clear_draft(ctx.user_id()).await?;
        ctx.set_status(ConversationStatus::Free).await
    };
    match cleanup.await {
        Ok(()) => HandlerError::MissingContext(reason.to_string()),
        Err(e) => e,
    }
}
