//! Intent handlers.
//!
//! [`dispatch`] is the boundary every inbound intent passes through:
//!
//! 1. an intent whose message id was already handled within
//!    [`REDELIVERY_WINDOW`] is dropped,
//! 2. the user row is refreshed from the intent's profile,
//! 3. text starting with `/` goes to [`commands`],
//! 4. anything else is routed on the user's conversation status, one
//!    handler per status.
//!
//! Handler errors stop here. Each one is logged, counted, and answered with
//! a single reply; nothing propagates past the relay.

mod commands;
mod context;
mod disactivate_room;
mod free;
mod helpers;
mod input_code;
mod input_new_admin;
mod input_new_room;
mod input_username;
mod membership;
mod participant;

pub use context::Context;
pub use helpers::fanout::{broadcast, relay_text};

use crate::error::{HandlerError, HandlerResult};
use crate::intent::Intent;
use crate::state::{ConversationStatus, Relay};
use crate::telemetry::{IntentTimer, spans};
use std::time::Duration;
use tracing::{Instrument, debug, error, warn};

/// Metric label for intents handled as commands.
const COMMAND_LABEL: &str = "COMMAND";

/// Metric label for intents whose status could not be read.
const UNKNOWN_LABEL: &str = "UNKNOWN";

/// How long a handled message id is remembered.
pub const REDELIVERY_WINDOW: Duration = Duration::from_secs(60);

/// Handle one intent. Errors are answered with a reply before being returned.
///
/// A message id seen again within [`REDELIVERY_WINDOW`] is skipped without a
/// reply. Internal failures release the id so the transport's retry is handled.
pub async fn dispatch(relay: &Relay, intent: Intent) -> HandlerResult {
    let claimed = match intent.message_id.as_deref() {
        None => None,
        Some(message_id) => match relay
            .cache
            .claim_intent(&intent.user_id, message_id, REDELIVERY_WINDOW)
            .await
        {
            Ok(true) => Some(message_id),
            Ok(false) => {
                debug!(user_id = %intent.user_id, message_id = %message_id, "Duplicate intent skipped");
                crate::metrics::record_duplicate_intent();
                return Ok(());
            }
            Err(e) => {
                warn!(user_id = %intent.user_id, error = %e, "Redelivery check failed, handling anyway");
                None
            }
        },
    };

    let result = handle_intent(relay, &intent).await;

    if let Some(message_id) = claimed
        && let Err(ref e) = result
        && e.is_internal()
        && let Err(release) = relay.cache.release_intent(&intent.user_id, message_id).await
    {
        warn!(user_id = %intent.user_id, error = %release, "Failed to release intent claim");
    }

    result
}

async fn handle_intent(relay: &Relay, intent: &Intent) -> HandlerResult {
    let ctx = Context::new(relay, intent);

    let (label, result) = match touch_user(&ctx).await {
        Err(e) => (UNKNOWN_LABEL, Err(e)),
        Ok(()) => match intent.command() {
            Some((name, arg)) => {
                let span = spans::intent(ctx.user_id(), COMMAND_LABEL, ctx.scope());
                let _timer = IntentTimer::new(COMMAND_LABEL);
                let result = commands::handle(&ctx, name, arg).instrument(span).await;
                (COMMAND_LABEL, result)
            }
            None => match ctx.status().await {
                Err(e) => (UNKNOWN_LABEL, Err(e)),
                Ok(status) => {
                    let label = status.kind();
                    let span = spans::intent(ctx.user_id(), label, status.room_id());
                    let _timer = IntentTimer::new(label);
                    let result = route(&ctx, status).instrument(span).await;
                    (label, result)
                }
            },
        },
    };

    if let Err(ref e) = result {
        crate::metrics::record_handler_error(label, e.error_code());
        if e.is_internal() {
            error!(user_id = %ctx.user_id(), status = label, error = %e, code = e.error_code(), "Intent failed");
        } else {
            debug!(user_id = %ctx.user_id(), status = label, error = %e, "Intent rejected");
        }
        ctx.reply(e.user_reply());
    }

    result
}

/// Exactly one handler per status.
async fn route(ctx: &Context<'_>, status: ConversationStatus) -> HandlerResult {
    match status {
        ConversationStatus::Free => free::handle(ctx).await,
        ConversationStatus::InputCode => input_code::handle(ctx).await,
        ConversationStatus::InputUsername { room_id } => {
            input_username::handle(ctx, &room_id).await
        }
        ConversationStatus::Participant { room_id } => participant::handle(ctx, &room_id).await,
        ConversationStatus::InputNewAdmin => input_new_admin::handle(ctx).await,
        ConversationStatus::InputNewRoom { stage } => input_new_room::handle(ctx, stage).await,
        ConversationStatus::DisactivateRoom => disactivate_room::handle(ctx).await,
    }
}

/// Create the user on first contact and refresh its profile afterwards.
async fn touch_user(ctx: &Context<'_>) -> HandlerResult {
    let users = ctx.relay.db.users();
    match &ctx.intent.profile {
        Some(profile) => {
            users.upsert(ctx.user_id(), profile).await?;
        }
        None => {
            users.ensure(ctx.user_id()).await?;
        }
    }
    Ok(())
}

/// Log and swallow a failure in a best-effort side step.
pub(crate) fn log_side_effect_failure(what: &str, user_id: &str, err: &HandlerError) {
    warn!(user_id = %user_id, error = %err, "Failed to {what}");
}
