//! HTTP ingress and Prometheus metrics endpoint.
//!
//! The bot transport posts normalized intents to `POST /intents`. Each one is
//! accepted immediately and handled on its own task; replies go out through
//! the delivery queue, never through the HTTP response.

use crate::intent::Intent;
use crate::state::Relay;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use tracing::{debug, info};

/// Handler for POST /intents.
async fn intent_handler(State(relay): State<Relay>, Json(intent): Json<Intent>) -> StatusCode {
    if intent.user_id.is_empty() {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    debug!(user_id = %intent.user_id, "Intent accepted");
    tokio::spawn(async move {
        // Failures were already answered and logged inside the relay.
        let _ = relay.handle(intent).await;
    });
    StatusCode::ACCEPTED
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Routes served by the relay.
pub fn router(relay: Relay) -> Router {
    Router::new()
        .route("/intents", post(intent_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(relay)
}

/// Run the HTTP server until the listener fails.
///
/// This is a long-running task that should be spawned in the background.
pub async fn run_http_server(addr: SocketAddr, relay: Relay) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, router(relay)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::config::QueueConfig;
    use crate::db::Database;
    use crate::delivery::{DeliveryProducer, MemoryBroker};
    use crate::state::RelaySettings;
    use std::sync::Arc;
    use std::time::Duration;

    async fn serve() -> (SocketAddr, Arc<MemoryBroker>, DeliveryProducer) {
        let db = Database::new(":memory:").await.unwrap();
        let broker = Arc::new(MemoryBroker::new(&QueueConfig::default()));
        let producer = DeliveryProducer::spawn(broker.clone(), "token", "delivery");
        let settings = RelaySettings {
            bot_token: "token".into(),
            bot_url: "https://t.me/anon_bot".into(),
            username_max_len: 32,
            rooms_page_size: 10,
        };
        let relay = Relay::new(
            db,
            Arc::new(MemoryStore::new()),
            Duration::from_secs(5),
            producer.clone(),
            settings,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(relay)).await.unwrap();
        });
        (addr, broker, producer)
    }

    #[tokio::test]
    async fn test_health() {
        let (addr, _, _) = serve().await;
        let body = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_intent_accepted_and_answered() {
        let (addr, broker, producer) = serve().await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/intents"))
            .json(&serde_json::json!({ "userId": "42", "text": "/start", "messageId": "7" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

        let mut replies = Vec::new();
        for _ in 0..50 {
            producer.flush().await;
            replies = broker.drain();
            if !replies.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].idempotency_key, "42-7");
        assert_eq!(replies[0].body.chat_id, "42");
    }

    #[tokio::test]
    async fn test_intent_without_user_rejected() {
        let (addr, _, _) = serve().await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/intents"))
            .json(&serde_json::json!({ "userId": "", "text": "hi" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    }
}
