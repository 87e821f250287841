//! anonrelay - anonymous room relay for conversational bots.

use anonrelay::cache::{CacheStore, MemoryStore, RedisStore};
use anonrelay::config::{self, CacheBackend, Config, QueueBackend};
use anonrelay::db::Database;
use anonrelay::delivery::{Broker, DeliveryProducer, ManagementApiBroker, MemoryBroker};
use anonrelay::state::{Relay, RelaySettings};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {config_path}",
            errors.len()
        ));
    }

    info!(
        bot = %config.bot.url,
        queue = %config.queue.queue,
        backend = ?config.queue.backend,
        "Starting anonrelay"
    );

    anonrelay::metrics::init();

    // Initialize database
    let db = Database::new(&config.database.path).await?;

    // Seed admins from config; everyone else is promoted with /new_admin
    if config.bot.admins.is_empty() {
        warn!("bot.admins is empty; admin commands stay unavailable until an admin exists");
    } else {
        let promoted = db.users().grant_admins(&config.bot.admins).await?;
        info!(admins = config.bot.admins.len(), promoted, "Admins seeded");
    }

    let store: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Memory => {
            warn!("Using the in-process cache; do not run more than one relay");
            let memory = Arc::new(MemoryStore::new());
            let sweeper = Arc::clone(&memory);
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
                loop {
                    tick.tick().await;
                    let purged = sweeper.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, "Expired cache entries purged");
                    }
                }
            });
            memory
        }
        CacheBackend::Redis => Arc::new(RedisStore::connect(&config.cache.url).await?),
    };

    // Declare the delivery queue before anything is published to it
    let broker: Arc<dyn Broker> = match config.queue.backend {
        QueueBackend::Memory => {
            warn!("Using the in-process delivery queue; nothing will reach the bot");
            Arc::new(MemoryBroker::new(&config.queue))
        }
        QueueBackend::ManagementApi => Arc::new(ManagementApiBroker::new(&config.queue)),
    };
    broker.declare().await?;
    info!(queue = %config.queue.queue, "Delivery queue declared");

    let producer = DeliveryProducer::spawn(broker, &config.bot.token, &config.queue.routing_key);

    let relay = Relay::new(
        db,
        store,
        config.cache.lock_ttl(),
        producer.clone(),
        RelaySettings::from_config(&config),
    );

    let server = tokio::spawn(anonrelay::http::run_http_server(config.http.listen, relay));

    tokio::select! {
        result = server => {
            match result {
                Ok(Ok(())) => info!("HTTP server stopped"),
                Ok(Err(e)) => {
                    error!(error = %e, "HTTP server failed");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    // Hand everything already queued to the broker before exiting
    producer.flush().await;
    info!("Delivery queue flushed, bye");

    Ok(())
}
