//! Slash commands.
//!
//! Commands are handled before status routing, so they work from any
//! status. Admin commands move the admin into a multi-step status and only
//! start outside a room, since a participant's text is always relayed.

use super::{Context, membership};
use crate::error::{HandlerResult, InvalidInput};
use crate::state::{ConversationStatus, NewRoomStage};
use std::fmt::Write as _;

const GREETING: &str = "Welcome to BotAnonymous!\nEnter /open for room connection";

const HELP: &str = "Commands:\n\
/start [code] - join a room by code\n\
/open - enter a room code\n\
/exit - leave the current room\n\
/rooms [page] - rooms you have joined\n\
/cancel - abort the current step";

const ADMIN_HELP: &str = "Admin commands:\n\
/new_room - create a room\n\
/new_admin - promote a user\n\
/disactivate_room - close a room";

pub(super) async fn handle(ctx: &Context<'_>, name: &str, arg: Option<&str>) -> HandlerResult {
    match name {
        "start" => match arg {
            Some(code) => membership::switch_room(ctx, code).await,
            None => {
                ctx.reply(GREETING);
                Ok(())
            }
        },
        "open" => membership::open(ctx).await,
        "exit" | "stop" => membership::exit(ctx).await,
        "cancel" => cancel(ctx).await,
        "rooms" => rooms(ctx, arg).await,
        "new_admin" => {
            begin_admin_flow(ctx, ConversationStatus::InputNewAdmin).await?;
            ctx.reply("Input ID of new admin");
            Ok(())
        }
        "new_room" => {
            begin_admin_flow(
                ctx,
                ConversationStatus::InputNewRoom {
                    stage: NewRoomStage::Code,
                },
            )
            .await?;
            ctx.reply("Input Code of room");
            Ok(())
        }
        "disactivate_room" => {
            begin_admin_flow(ctx, ConversationStatus::DisactivateRoom).await?;
            ctx.reply("Input code of room to disactivate");
            Ok(())
        }
        _ => help(ctx).await,
    }
}

/// Check the caller may start an admin flow and move it into `status`.
async fn begin_admin_flow(ctx: &Context<'_>, status: ConversationStatus) -> HandlerResult {
    ctx.require_admin().await?;
    if matches!(ctx.settled_status().await?, ConversationStatus::Participant { .. }) {
        return Err(InvalidInput::LeaveRoomFirst.into());
    }
    ctx.relay.cache.clear_draft(ctx.user_id()).await?;
    ctx.set_status(status).await
}

/// `/cancel`: drop any half-finished input. Room membership is left alone.
async fn cancel(ctx: &Context<'_>) -> HandlerResult {
    if matches!(ctx.settled_status().await?, ConversationStatus::Participant { .. }) {
        ctx.reply("You are in a room. Enter /exit to leave it");
        return Ok(());
    }
    ctx.relay.cache.clear_draft(ctx.user_id()).await?;
    ctx.set_status(ConversationStatus::Free).await?;
    ctx.reply("Cancelled");
    Ok(())
}

/// `/rooms [page]`: one page of the rooms the user has joined.
async fn rooms(ctx: &Context<'_>, arg: Option<&str>) -> HandlerResult {
    let page = arg
        .and_then(|a| a.parse::<u64>().ok())
        .filter(|&p| p > 0)
        .unwrap_or(1);
    let take = ctx.relay.settings.rooms_page_size;
    let result = ctx
        .relay
        .db
        .rooms()
        .user_rooms(ctx.user_id(), (page - 1).saturating_mul(take), take)
        .await?;

    if result.total == 0 {
        ctx.reply("You have no rooms yet");
        return Ok(());
    }

    let mut text = String::from("Your rooms:\n");
    for room in &result.rooms {
        let _ = write!(text, "{} - {}", room.title, room.code);
        if !room.is_active {
            text.push_str(" (inactive)");
        }
        text.push('\n');
    }
    if result.rooms.is_empty() {
        text.push_str("Nothing on this page\n");
    }
    let _ = write!(text, "Page {page}/{}", result.total_pages());

    ctx.reply(text);
    Ok(())
}

async fn help(ctx: &Context<'_>) -> HandlerResult {
    let is_admin = ctx
        .relay
        .db
        .users()
        .find(ctx.user_id())
        .await?
        .is_some_and(|u| u.is_admin);
    if is_admin {
        ctx.reply(format!("{HELP}\n\n{ADMIN_HELP}"));
    } else {
        ctx.reply(HELP);
    }
    Ok(())
}
