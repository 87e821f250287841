//! In-process [`Broker`] with message TTL and dead-lettering.
//!
//! Used by the `memory` backend and by tests. Envelopes not consumed within
//! the TTL move to the dead-letter list and are never delivered.

use super::{Broker, BrokerError, Envelope};
use crate::config::QueueConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
pub struct MemoryBroker {
    message_ttl: Duration,
    dead_letter_routing_key: String,
    queue: Mutex<VecDeque<(Envelope, Instant)>>,
    dead_letters: Mutex<Vec<Envelope>>,
    rejecting: AtomicBool,
}

impl MemoryBroker {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            message_ttl: config.message_ttl(),
            dead_letter_routing_key: config.dead_letter_routing_key.clone(),
            queue: Mutex::new(VecDeque::new()),
            dead_letters: Mutex::new(Vec::new()),
            rejecting: AtomicBool::new(false),
        }
    }

    /// Make every following publish fail (outage simulation).
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::Relaxed);
    }

    /// Move expired envelopes to the dead-letter list.
    pub fn expire(&self) {
        let now = Instant::now();
        let mut queue = self.queue.lock();
        let mut dead = self.dead_letters.lock();
        while let Some((_, enqueued_at)) = queue.front() {
            if now.duration_since(*enqueued_at) < self.message_ttl {
                break;
            }
            if let Some((mut envelope, _)) = queue.pop_front() {
                debug!(key = %envelope.idempotency_key, "Envelope dead-lettered");
                envelope.routing_key = self.dead_letter_routing_key.clone();
                dead.push(envelope);
            }
        }
    }

    /// Envelopes waiting for a consumer, oldest first.
    pub fn pending(&self) -> Vec<Envelope> {
        self.expire();
        self.queue.lock().iter().map(|(e, _)| e.clone()).collect()
    }

    /// Take the oldest live envelope.
    pub fn consume(&self) -> Option<Envelope> {
        self.expire();
        self.queue.lock().pop_front().map(|(e, _)| e)
    }

    /// Take every live envelope.
    pub fn drain(&self) -> Vec<Envelope> {
        self.expire();
        self.queue.lock().drain(..).map(|(e, _)| e).collect()
    }

    pub fn dead_letters(&self) -> Vec<Envelope> {
        self.expire();
        self.dead_letters.lock().clone()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    /// Nothing to set up: the queue exists as soon as the broker does.
    async fn declare(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn publish(&self, envelope: &Envelope) -> Result<(), BrokerError> {
        if self.rejecting.load(Ordering::Relaxed) {
            return Err(BrokerError::Rejected("broker unavailable".to_string()));
        }
        self.queue
            .lock()
            .push_back((envelope.clone(), Instant::now()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{OutboundMessage, reply_key};

    fn envelope(n: u32) -> Envelope {
        Envelope::new(
            OutboundMessage::text("tok", "42", format!("m{n}")),
            reply_key("42", &n.to_string()),
            "message.send",
        )
    }

    #[tokio::test]
    async fn keeps_publish_order() {
        let broker = MemoryBroker::new(&QueueConfig::default());
        for n in 0..3 {
            broker.publish(&envelope(n)).await.unwrap();
        }
        let keys: Vec<_> = broker
            .drain()
            .into_iter()
            .map(|e| e.idempotency_key)
            .collect();
        assert_eq!(keys, ["42-0", "42-1", "42-2"]);
    }

    #[tokio::test]
    async fn unconsumed_envelopes_are_dead_lettered() {
        tokio::time::pause();
        let broker = MemoryBroker::new(&QueueConfig::default());
        broker.publish(&envelope(1)).await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        broker.publish(&envelope(2)).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        let dead = broker.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].routing_key, "dlx_routing_key");
        assert_eq!(broker.consume().map(|e| e.idempotency_key).as_deref(), Some("42-2"));
        assert!(broker.consume().is_none());
    }

    #[tokio::test]
    async fn rejecting_broker_fails_publish() {
        let broker = MemoryBroker::new(&QueueConfig::default());
        broker.set_rejecting(true);
        assert!(matches!(
            broker.publish(&envelope(1)).await,
            Err(BrokerError::Rejected(_))
        ));
        assert!(broker.pending().is_empty());
    }
}
