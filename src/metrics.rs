//! Prometheus metrics collection for anonrelay.
//!
//! Exposed on the HTTP intake under `/metrics`.
//!
//! - `relay_intents_total{status}` - Intents processed by conversation status
//! - `relay_intent_duration_seconds{status}` - Intent latency histogram
//! - `relay_handler_errors_total{status,error}` - Handler failures
//! - `relay_fanout_recipients` - Recipients per relayed message (histogram)
//! - `relay_deliveries_published_total` / `relay_deliveries_failed_total`
//! - `relay_active_members{room}` - Active members per room (gauge)

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Intents
// ========================================================================

/// Intents processed by status kind.
pub static INTENT_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Intent processing latency by status kind.
pub static INTENT_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Intents dropped as redeliveries of an already handled message.
pub static DUPLICATE_INTENTS: OnceLock<IntCounter> = OnceLock::new();

/// Handler errors by status kind and error code.
pub static HANDLER_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Relay
// ========================================================================

/// Recipients per relayed room message.
pub static FANOUT_RECIPIENTS: OnceLock<Histogram> = OnceLock::new();

/// Active members per room.
pub static ACTIVE_MEMBERS: OnceLock<IntGaugeVec> = OnceLock::new();

// ========================================================================
// Delivery
// ========================================================================

/// Envelopes accepted by the broker.
pub static DELIVERIES_PUBLISHED: OnceLock<IntCounter> = OnceLock::new();

/// Envelopes the broker refused or could not be reached for.
pub static DELIVERIES_FAILED: OnceLock<IntCounter> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Called once at start-up. Recording before `init` is a silent no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(INTENT_COUNTER, IntCounterVec::new(Opts::new("relay_intents_total", "Intents processed by conversation status"), &["status"]));
    register!(INTENT_LATENCY, HistogramVec::new(
        HistogramOpts::new("relay_intent_duration_seconds", "Intent latency by conversation status")
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["status"]));
    register!(DUPLICATE_INTENTS, IntCounter::new("relay_duplicate_intents_total", "Redelivered intents skipped"));
    register!(HANDLER_ERRORS, IntCounterVec::new(Opts::new("relay_handler_errors_total", "Handler errors by status and error code"), &["status", "error"]));
    register!(FANOUT_RECIPIENTS, Histogram::with_opts(
        HistogramOpts::new("relay_fanout_recipients", "Recipients per relayed room message")
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0])));
    register!(ACTIVE_MEMBERS, IntGaugeVec::new(Opts::new("relay_active_members", "Active members per room"), &["room"]));
    register!(DELIVERIES_PUBLISHED, IntCounter::new("relay_deliveries_published_total", "Envelopes accepted by the broker"));
    register!(DELIVERIES_FAILED, IntCounter::new("relay_deliveries_failed_total", "Envelopes that failed to publish"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

/// Record a processed intent with latency.
#[inline]
pub fn record_intent(status: &str, duration_secs: f64) {
    if let Some(c) = INTENT_COUNTER.get() {
        c.with_label_values(&[status]).inc();
    }
    if let Some(h) = INTENT_LATENCY.get() {
        h.with_label_values(&[status]).observe(duration_secs);
    }
}

/// Record a handler error.
#[inline]
pub fn record_handler_error(status: &str, error: &str) {
    if let Some(c) = HANDLER_ERRORS.get() {
        c.with_label_values(&[status, error]).inc();
    }
}

/// Record message fan-out (how many recipients a room message was relayed to).
#[inline]
pub fn record_duplicate_intent() {
    if let Some(c) = DUPLICATE_INTENTS.get() {
        c.inc();
    }
}

#[inline]
pub fn record_fanout(recipients: usize) {
    if let Some(h) = FANOUT_RECIPIENTS.get() {
        h.observe(recipients as f64);
    }
}

/// Update the active member gauge of a room.
#[inline]
pub fn set_active_members(room_id: &str, count: usize) {
    if let Some(g) = ACTIVE_MEMBERS.get() {
        g.with_label_values(&[room_id])
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

/// Drop a room from the members gauge (when the room is deactivated).
#[inline]
pub fn remove_room_metrics(room_id: &str) {
    if let Some(g) = ACTIVE_MEMBERS.get() {
        let _ = g.remove_label_values(&[room_id]);
    }
}

#[inline]
pub fn record_delivery_published() {
    if let Some(c) = DELIVERIES_PUBLISHED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_delivery_failed() {
    if let Some(c) = DELIVERIES_FAILED.get() {
        c.inc();
    }
}
