//! Inbound intents as delivered by the bot transport.

use crate::db::UserProfile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of payload an intent or envelope carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    #[default]
    Text,
    Photo,
    Video,
    Audio,
    File,
    Animation,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "TEXT",
            Self::Photo => "PHOTO",
            Self::Video => "VIDEO",
            Self::Audio => "AUDIO",
            Self::File => "FILE",
            Self::Animation => "ANIMATION",
        })
    }
}

/// How an outbound message is addressed. The relay only ever writes to
/// one chat per envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    SingleChat,
}

/// One inbound event from a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub user_id: String,
    /// Set when the transport binds the conversation to a room.
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_ref: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub reply_to_text: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

impl Intent {
    /// Plain text intent, mostly for tests and tooling.
    pub fn text(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Trimmed text, `None` when absent or blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// The command word and its argument when the text starts with `/`.
    ///
    /// `/start@anon_bot ABC` yields `("start", Some("ABC"))`.
    pub fn command(&self) -> Option<(&str, Option<&str>)> {
        let text = self.trimmed_text()?.strip_prefix('/')?;
        let (word, rest) = match text.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, Some(rest.trim()).filter(|r| !r.is_empty())),
            None => (text, None),
        };
        let word = word.split_once('@').map_or(word, |(w, _)| w);
        if word.is_empty() {
            return None;
        }
        Some((word, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_payload() {
        let intent: Intent = serde_json::from_str(
            r#"{"userId":"42","text":"hi","contentType":"PHOTO","mediaRef":"file-1",
                "replyToText":"earlier","messageId":"7","profile":{"firstName":"Ann"}}"#,
        )
        .unwrap();
        assert_eq!(intent.user_id, "42");
        assert_eq!(intent.content_type, ContentType::Photo);
        assert_eq!(intent.media_ref.as_deref(), Some("file-1"));
        assert_eq!(intent.message_id.as_deref(), Some("7"));
        assert_eq!(
            intent.profile.unwrap().first_name.as_deref(),
            Some("Ann")
        );

        let minimal: Intent = serde_json::from_str(r#"{"userId":"1"}"#).unwrap();
        assert_eq!(minimal.content_type, ContentType::Text);
    }

    #[test]
    fn command_parsing() {
        assert_eq!(Intent::text("u", "/start ABC").command(), Some(("start", Some("ABC"))));
        assert_eq!(Intent::text("u", "/open@anon_bot").command(), Some(("open", None)));
        assert_eq!(Intent::text("u", " /rooms  2 ").command(), Some(("rooms", Some("2"))));
        assert_eq!(Intent::text("u", "hello").command(), None);
        assert_eq!(Intent::text("u", "/").command(), None);
    }
}
