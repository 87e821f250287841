//! RabbitMQ [`Broker`] over the HTTP management API.
//!
//! Declares the queue with `PUT /api/queues/{vhost}/{queue}` and publishes
//! with `POST /api/exchanges/{vhost}/{exchange}/publish`. Messages are sent
//! persistent (`delivery_mode = 2`) with the envelope headers attached.
//!
//! RabbitMQ documents the publish endpoint as a diagnostics tool: one HTTP
//! request per message and no publisher confirms. It suits low volume and
//! development. A deployment with real
//! traffic needs an AMQP 0-9-1 client behind the same [`Broker`] trait.

use super::{Broker, BrokerError, Envelope};
use crate::config::QueueConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Name the management API uses for the nameless default exchange.
const DEFAULT_EXCHANGE: &str = "amq.default";

#[derive(Debug, Deserialize)]
struct PublishResponse {
    routed: bool,
}

/// Publishes through the RabbitMQ management plugin.
#[derive(Clone)]
pub struct ManagementApiBroker {
    base_url: String,
    config: QueueConfig,
    client: reqwest::Client,
}

impl ManagementApiBroker {
    pub fn new(config: &QueueConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            config: config.clone(),
            client,
        }
    }

    fn vhost(&self) -> String {
        self.config.vhost.replace('/', "%2F")
    }

    fn queue_url(&self) -> String {
        format!("{}/api/queues/{}/{}", self.base_url, self.vhost(), self.config.queue)
    }

    fn publish_url(&self) -> String {
        let exchange = if self.config.exchange.is_empty() {
            DEFAULT_EXCHANGE
        } else {
            self.config.exchange.as_str()
        };
        format!(
            "{}/api/exchanges/{}/{}/publish",
            self.base_url,
            self.vhost(),
            exchange
        )
    }

    /// The default exchange routes by queue name; named exchanges by routing key.
    fn publish_routing_key<'a>(&'a self, envelope: &'a Envelope) -> &'a str {
        if self.config.exchange.is_empty() {
            &self.config.queue
        } else {
            &envelope.routing_key
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BrokerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BrokerError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Broker for ManagementApiBroker {
    async fn declare(&self) -> Result<(), BrokerError> {
        let body = json!({
            "durable": true,
            "auto_delete": false,
            "arguments": {
                "x-message-ttl": self.config.message_ttl_ms,
                "x-dead-letter-exchange": self.config.dead_letter_exchange,
                "x-dead-letter-routing-key": self.config.dead_letter_routing_key,
            }
        });
        let response = self
            .client
            .put(self.queue_url())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        info!(queue = %self.config.queue, "Delivery queue declared");
        Ok(())
    }

    async fn publish(&self, envelope: &Envelope) -> Result<(), BrokerError> {
        let body = json!({
            "properties": {
                "delivery_mode": 2,
                "content_type": "application/json",
                "message_id": envelope.idempotency_key,
                "headers": envelope.headers,
            },
            "routing_key": self.publish_routing_key(envelope),
            "payload": envelope.payload()?,
            "payload_encoding": "string",
        });
        let response = self
            .client
            .post(self.publish_url())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;
        let published: PublishResponse = Self::check(response).await?.json().await?;
        if !published.routed {
            return Err(BrokerError::Unroutable);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{OutboundMessage, fanout_key};
    use axum::Router;
    use axum::http::{Method, StatusCode, Uri};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::Arc;

    type Seen = Arc<Mutex<Vec<(Method, String, Value)>>>;

    async fn spawn_management_server(routed: bool) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let log = seen.clone();
        let app = Router::new().fallback(move |method: Method, uri: Uri, body: String| {
            let log = log.clone();
            async move {
                let value: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
                log.lock().push((method.clone(), uri.path().to_string(), value));
                if method == Method::PUT {
                    (StatusCode::CREATED, String::new())
                } else {
                    (StatusCode::OK, json!({ "routed": routed }).to_string())
                }
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        (format!("http://{addr}"), seen)
    }

    fn config(url: &str) -> QueueConfig {
        QueueConfig {
            url: url.to_string(),
            ..Default::default()
        }
    }

    fn envelope() -> Envelope {
        Envelope::new(
            OutboundMessage::text("tok", "b", "hi"),
            fanout_key("a", "b", None),
            "message.send",
        )
    }

    #[tokio::test]
    async fn declares_queue_with_ttl_and_dead_letter() {
        let (url, seen) = spawn_management_server(true).await;
        ManagementApiBroker::new(&config(&url)).declare().await.unwrap();

        let seen = seen.lock();
        let (method, path, body) = &seen[0];
        assert_eq!(*method, Method::PUT);
        assert_eq!(path, "/api/queues/%2F/message_send_queue");
        assert_eq!(body["durable"], true);
        assert_eq!(body["arguments"]["x-message-ttl"], 60_000);
        assert_eq!(body["arguments"]["x-dead-letter-exchange"], "dlx_exchange");
        assert_eq!(body["arguments"]["x-dead-letter-routing-key"], "dlx_routing_key");
    }

    #[tokio::test]
    async fn publishes_persistent_message_with_headers() {
        let (url, seen) = spawn_management_server(true).await;
        ManagementApiBroker::new(&config(&url))
            .publish(&envelope())
            .await
            .unwrap();

        let seen = seen.lock();
        let (_, path, body) = &seen[0];
        assert_eq!(path, "/api/exchanges/%2F/amq.default/publish");
        assert_eq!(body["routing_key"], "message_send_queue");
        assert_eq!(body["properties"]["delivery_mode"], 2);
        assert_eq!(body["properties"]["headers"]["message-id"], "a-fanout-b");
        assert_eq!(
            body["properties"]["headers"]["x-original-routing-key"],
            "message.send"
        );
        let payload: Value = serde_json::from_str(body["payload"].as_str().unwrap()).unwrap();
        assert_eq!(payload["chatId"], "b");
    }

    #[tokio::test]
    async fn unrouted_publish_is_an_error() {
        let (url, _seen) = spawn_management_server(false).await;
        let err = ManagementApiBroker::new(&config(&url))
            .publish(&envelope())
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Unroutable));
    }
}
