//! Handler context.
//!
//! Defines the `Context<'a>` passed to every handler: the relay, the intent
//! being handled, and a reply channel back to the user's chat.

use crate::error::{HandlerError, HandlerResult, InvalidInput};
use crate::intent::Intent;
use crate::state::{ConversationStatus, Relay};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;
use uuid::Uuid;

/// Handler context passed to each status and command handler.
pub struct Context<'a> {
    /// Shared relay state.
    pub relay: &'a Relay,
    /// The intent being handled.
    pub intent: &'a Intent,
    /// Message id replies are keyed on.
    reply_id: String,
    /// Replies sent so far for this intent.
    replies: AtomicU32,
}

impl<'a> Context<'a> {
    pub fn new(relay: &'a Relay, intent: &'a Intent) -> Self {
        let reply_id = intent
            .message_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            relay,
            intent,
            reply_id,
            replies: AtomicU32::new(0),
        }
    }

    /// The platform user id, which is also the reply chat id.
    pub fn user_id(&self) -> &'a str {
        &self.intent.user_id
    }

    /// Room the transport bound the conversation to, if any.
    pub fn scope(&self) -> Option<&'a str> {
        self.intent.room_id.as_deref()
    }

    /// Trimmed text input, or an error asking for text.
    pub fn text(&self) -> Result<&'a str, HandlerError> {
        self.intent
            .trimmed_text()
            .ok_or(HandlerError::InvalidInput(InvalidInput::ExpectedText))
    }

    pub async fn status(&self) -> Result<ConversationStatus, HandlerError> {
        Ok(self.relay.cache.status(self.user_id(), self.scope()).await?)
    }

    /// Like [`status`](Self::status), but an undecodable cached status is
    /// replaced by the one rebuilt from the directory instead of failing.
    ///
    /// Used by commands that must work from any state.
    pub async fn settled_status(&self) -> Result<ConversationStatus, HandlerError> {
        match self.status().await {
            Err(HandlerError::UnhandledStatus(raw)) => {
                debug!(user_id = %self.user_id(), raw = %raw, "Status rebuilt for command");
                self.status().await
            }
            other => other,
        }
    }

    pub async fn set_status(&self, status: ConversationStatus) -> HandlerResult {
        self.relay
            .cache
            .set_status(self.user_id(), self.scope(), &status)
            .await?;
        Ok(())
    }

    /// Send a text reply to the user's chat. Fire-and-forget.
    ///
    /// The first reply is keyed `{chat}-{message}`; later replies to the same
    /// intent get a sequence suffix so they are not taken for duplicates.
    pub fn reply(&self, text: impl Into<String>) {
        let n = self.replies.fetch_add(1, Ordering::Relaxed);
        let message_id = if n == 0 {
            self.reply_id.clone()
        } else {
            format!("{}-{n}", self.reply_id)
        };
        self.relay.producer.reply(self.user_id(), &message_id, text);
    }

    /// Fail with [`HandlerError::Forbidden`] unless the user is an admin.
    pub async fn require_admin(&self) -> HandlerResult {
        let is_admin = self
            .relay
            .db
            .users()
            .find(self.user_id())
            .await?
            .is_some_and(|user| user.is_admin);
        if !is_admin {
            return Err(HandlerError::Forbidden(self.user_id().to_string()));
        }
        Ok(())
    }
}
