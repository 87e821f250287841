//! Outbound message envelope and idempotency keys.

use crate::intent::{ContentType, MessageType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header carrying the routing key the message was first published with.
pub const HEADER_ORIGINAL_ROUTING_KEY: &str = "x-original-routing-key";

/// Header carrying the idempotency key.
pub const HEADER_MESSAGE_ID: &str = "message-id";

/// Body consumed by the delivery worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    pub content_type: ContentType,
    #[serde(rename = "type")]
    pub message_type: MessageType,
}

impl OutboundMessage {
    /// Plain text to one chat.
    pub fn text(bot_token: &str, chat_id: &str, text: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            text: Some(text.into()),
            file_id: None,
            content_type: ContentType::Text,
            message_type: MessageType::SingleChat,
        }
    }
}

/// One outbound message addressed to one recipient, ready for the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Deterministic key; the consumer drops repeats.
    pub idempotency_key: String,
    pub routing_key: String,
    pub headers: BTreeMap<String, String>,
    pub body: OutboundMessage,
}

impl Envelope {
    pub fn new(body: OutboundMessage, idempotency_key: String, routing_key: &str) -> Self {
        let headers = BTreeMap::from([
            (HEADER_ORIGINAL_ROUTING_KEY.to_string(), routing_key.to_string()),
            (HEADER_MESSAGE_ID.to_string(), idempotency_key.clone()),
        ]);
        Self {
            idempotency_key,
            routing_key: routing_key.to_string(),
            headers,
            body,
        }
    }

    pub fn payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.body)
    }
}

/// `{sender}-fanout-{recipient}`, suffixed with the inbound message id when known.
pub fn fanout_key(sender_id: &str, recipient_id: &str, message_id: Option<&str>) -> String {
    match message_id {
        Some(id) => format!("{sender_id}-fanout-{recipient_id}-{id}"),
        None => format!("{sender_id}-fanout-{recipient_id}"),
    }
}

/// `{chat}-{message}` for a direct reply.
pub fn reply_key(chat_id: &str, message_id: &str) -> String {
    format!("{chat_id}-{message_id}")
}
