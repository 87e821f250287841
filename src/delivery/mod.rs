//! Delivery queue producer.
//!
//! Handlers hand envelopes to [`DeliveryProducer`], which forwards them to a
//! single publisher task. Callers never wait on the broker: the task keeps
//! the order in which envelopes were submitted, and a failed publish is
//! logged and counted, never reported back into the conversation flow.
//!
//! - [`Broker`]: the broker seam
//! - [`MemoryBroker`]: in-process queue with TTL and dead-lettering
//! - [`ManagementApiBroker`]: RabbitMQ through its HTTP management API

mod broker;
mod envelope;
mod management;
mod memory;

pub use broker::{Broker, BrokerError};
pub use envelope::{
    Envelope, HEADER_MESSAGE_ID, HEADER_ORIGINAL_ROUTING_KEY, OutboundMessage, fanout_key,
    reply_key,
};
pub use management::ManagementApiBroker;
pub use memory::MemoryBroker;

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum ProducerCommand {
    Publish(Envelope),
    Flush(oneshot::Sender<()>),
}

/// Handle to the publisher task. Cheap to clone.
#[derive(Clone)]
pub struct DeliveryProducer {
    tx: mpsc::UnboundedSender<ProducerCommand>,
    bot_token: Arc<str>,
    routing_key: Arc<str>,
}

impl DeliveryProducer {
    /// Spawn the publisher task in front of `broker`.
    pub fn spawn(broker: Arc<dyn Broker>, bot_token: &str, routing_key: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(broker, rx));
        Self {
            tx,
            bot_token: Arc::from(bot_token),
            routing_key: Arc::from(routing_key),
        }
    }

    pub fn bot_token(&self) -> &str {
        &self.bot_token
    }

    /// Wrap `body` and queue it for publishing under `idempotency_key`.
    pub fn publish(&self, body: OutboundMessage, idempotency_key: String) {
        let envelope = Envelope::new(body, idempotency_key, &self.routing_key);
        if self.tx.send(ProducerCommand::Publish(envelope)).is_err() {
            warn!("Publisher task is gone, envelope dropped");
            crate::metrics::record_delivery_failed();
        }
    }

    /// Queue a plain text reply to `chat_id`.
    pub fn reply(&self, chat_id: &str, message_id: &str, text: impl Into<String>) {
        self.publish(
            OutboundMessage::text(&self.bot_token, chat_id, text),
            reply_key(chat_id, message_id),
        );
    }

    /// Wait until everything queued before this call has been handed to the broker.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(ProducerCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run(broker: Arc<dyn Broker>, mut rx: mpsc::UnboundedReceiver<ProducerCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            ProducerCommand::Publish(envelope) => match broker.publish(&envelope).await {
                Ok(()) => {
                    debug!(key = %envelope.idempotency_key, chat_id = %envelope.body.chat_id, "Envelope published");
                    crate::metrics::record_delivery_published();
                }
                Err(e) => {
                    warn!(key = %envelope.idempotency_key, error = %e, "Failed to publish envelope");
                    crate::metrics::record_delivery_failed();
                }
            },
            ProducerCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Publisher task stopped");
}
