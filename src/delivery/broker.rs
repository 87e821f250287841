//! Broker seam.

use super::Envelope;
use async_trait::async_trait;
use thiserror::Error;

/// Broker errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("broker returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("message was not routed to any queue")]
    Unroutable,
    #[error("broker rejected publish: {0}")]
    Rejected(String),
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A durable message broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declare the delivery queue with its TTL and dead-letter arguments.
    async fn declare(&self) -> Result<(), BrokerError>;

    /// Publish one envelope persistently.
    async fn publish(&self, envelope: &Envelope) -> Result<(), BrokerError>;
}
