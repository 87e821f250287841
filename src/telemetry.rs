//! Telemetry utilities for intent timing and span construction.

use std::time::Instant;

/// Guard for timing intent handling and recording metrics.
///
/// Records the latency under the status label when dropped.
pub struct IntentTimer {
    status: &'static str,
    start: Instant,
}

impl IntentTimer {
    /// Start timing an intent handled under `status`.
    pub fn new(status: &'static str) -> Self {
        Self {
            status,
            start: Instant::now(),
        }
    }
}

impl Drop for IntentTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_intent(self.status, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for handling one inbound intent.
    pub fn intent(user_id: &str, status: &str, room_id: Option<&str>) -> Span {
        if let Some(room_id) = room_id {
            info_span!("intent", user_id = %user_id, status = %status, room_id = %room_id)
        } else {
            info_span!("intent", user_id = %user_id, status = %status)
        }
    }

    /// Span for one room broadcast.
    pub fn fanout(room_id: &str, sender_id: &str) -> Span {
        info_span!("fanout", room_id = %room_id, sender_id = %sender_id)
    }
}
