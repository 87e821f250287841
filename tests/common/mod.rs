//! Integration test common infrastructure.
//!
//! Runs a relay in-process on an in-memory directory, an in-memory cache and
//! an in-memory delivery queue, and collects what the relay publishes.

#![allow(dead_code)]

use anonrelay::cache::MemoryStore;
use anonrelay::config::QueueConfig;
use anonrelay::db::{Database, NewRoom, Room};
use anonrelay::delivery::{DeliveryProducer, Envelope, MemoryBroker};
use anonrelay::error::HandlerResult;
use anonrelay::intent::Intent;
use anonrelay::state::{ConversationStatus, Relay, RelaySettings};
use std::sync::Arc;
use std::time::Duration;

pub const BOT_TOKEN: &str = "test-token";
pub const BOT_URL: &str = "https://t.me/anon_test_bot";

/// A relay instance with its queue exposed.
pub struct TestRelay {
    pub relay: Relay,
    pub broker: Arc<MemoryBroker>,
    seq: std::sync::atomic::AtomicU64,
}

impl TestRelay {
    pub async fn spawn() -> anyhow::Result<Self> {
        let db = Database::new(":memory:").await?;
        let broker = Arc::new(MemoryBroker::new(&QueueConfig::default()));
        let producer = DeliveryProducer::spawn(broker.clone(), BOT_TOKEN, "message.send");
        let settings = RelaySettings {
            bot_token: BOT_TOKEN.to_string(),
            bot_url: BOT_URL.to_string(),
            username_max_len: 32,
            rooms_page_size: 10,
        };
        let relay = Relay::new(
            db,
            Arc::new(MemoryStore::new()),
            Duration::from_secs(5),
            producer,
            settings,
        );
        Ok(Self {
            relay,
            broker,
            seq: std::sync::atomic::AtomicU64::new(1),
        })
    }

    /// Handle a text intent and return everything it published.
    pub async fn send(&self, user_id: &str, text: &str) -> Vec<Envelope> {
        let mut intent = Intent::text(user_id, text);
        intent.message_id = Some(self.next_message_id());
        self.send_intent(intent).await.1
    }

    /// Handle `intent` and return its result plus everything it published.
    pub async fn send_intent(&self, intent: Intent) -> (HandlerResult, Vec<Envelope>) {
        let result = self.relay.handle(intent).await;
        self.relay.producer.flush().await;
        (result, self.broker.drain())
    }

    pub fn next_message_id(&self) -> String {
        self.seq
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            .to_string()
    }

    pub async fn create_room(&self, code: &str, title: &str) -> Room {
        self.relay
            .db
            .rooms()
            .create(&NewRoom {
                code: code.to_string(),
                title: title.to_string(),
                description: Some(format!("{title} room")),
            })
            .await
            .expect("create room")
    }

    pub async fn make_admin(&self, user_id: &str) {
        self.relay
            .db
            .users()
            .grant_admins(&[user_id.to_string()])
            .await
            .expect("grant admin");
    }

    /// Join `code` as `username`, asserting the welcome reply.
    pub async fn join(&self, user_id: &str, code: &str, username: &str) {
        let prompt = self.send(user_id, &format!("/start {code}")).await;
        assert_eq!(texts_to(&prompt, user_id)[0], "Input username for room");
        let welcome = self.send(user_id, username).await;
        assert!(
            texts_to(&welcome, user_id)[0].starts_with(&format!("Welcome {username} to ")),
            "unexpected join reply: {welcome:?}"
        );
    }

    pub async fn status(&self, user_id: &str) -> ConversationStatus {
        self.relay
            .cache
            .status(user_id, None)
            .await
            .expect("status")
    }
}

/// Texts of the envelopes addressed to `chat_id`, in publish order.
pub fn texts_to(envelopes: &[Envelope], chat_id: &str) -> Vec<String> {
    envelopes
        .iter()
        .filter(|e| e.body.chat_id == chat_id)
        .filter_map(|e| e.body.text.clone())
        .collect()
}

/// Chats that received at least one envelope.
pub fn recipients(envelopes: &[Envelope]) -> Vec<String> {
    let mut chats: Vec<String> = envelopes.iter().map(|e| e.body.chat_id.clone()).collect();
    chats.sort();
    chats.dedup();
    chats
}
