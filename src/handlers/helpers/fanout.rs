//! Room fan-out.

use crate::db::Participant;
use crate::delivery::{OutboundMessage, fanout_key};
use crate::error::HandlerResult;
use crate::intent::{Intent, MessageType};
use crate::state::Relay;
use crate::telemetry::spans;
use tracing::{Instrument, debug};

/// Marker in front of the sender's room username.
const SENDER_MARK: &str = "🥷🏿";

/// Text delivered to the other members: the sender's room username, the
/// quoted message being replied to, then the message itself.
pub fn relay_text(username: &str, reply_to: Option<&str>, text: Option<&str>) -> String {
    let mut out = format!("{SENDER_MARK} {username}\n");
    if let Some(quoted) = reply_to.map(str::trim).filter(|q| !q.is_empty()) {
        for line in quoted.lines() {
            out.push_str("> ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str(text.unwrap_or_default());
    out
}

/// Relay `intent` from `sender` to every other active member of `room_id`.
///
/// Recipients come from the cached active set only. Each one gets its own
/// envelope, keyed `{sender}-fanout-{recipient}` (plus the inbound message
/// id when known). Media is forwarded as is. A room with nobody else in it
/// is a silent no-op.
pub async fn broadcast(
    relay: &Relay,
    room_id: &str,
    sender: &Participant,
    intent: &Intent,
) -> HandlerResult {
    let span = spans::fanout(room_id, &sender.user_id);
    fan_out(relay, room_id, sender, intent).instrument(span).await
}

async fn fan_out(
    relay: &Relay,
    room_id: &str,
    sender: &Participant,
    intent: &Intent,
) -> HandlerResult {
    let mut members = relay.cache.active_user_ids(room_id).await?;
    members.sort_unstable();

    let username = sender.username.as_deref().unwrap_or_default();
    let text = relay_text(
        username,
        intent.reply_to_text.as_deref(),
        intent.text.as_deref().map(str::trim),
    );

    let mut recipients = 0usize;
    for member in members.iter().filter(|m| **m != sender.user_id) {
        let body = OutboundMessage {
            bot_token: relay.settings.bot_token.clone(),
            chat_id: member.clone(),
            text: Some(text.clone()),
            file_id: intent.media_ref.clone(),
            content_type: intent.content_type,
            message_type: MessageType::SingleChat,
        };
        relay.producer.publish(
            body,
            fanout_key(&sender.user_id, member, intent.message_id.as_deref()),
        );
        recipients += 1;
    }

    crate::metrics::record_fanout(recipients);
    debug!(recipients, "Message relayed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_text_attributes_and_quotes() {
        assert_eq!(relay_text("alice", None, Some("hi")), "🥷🏿 alice\nhi");
        assert_eq!(
            relay_text("alice", Some("earlier\nline"), Some("yes")),
            "🥷🏿 alice\n> earlier\n> line\nyes"
        );
        // Media without a caption still carries the attribution.
        assert_eq!(relay_text("bob", None, None), "🥷🏿 bob\n");
    }
}
