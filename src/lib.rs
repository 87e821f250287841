//! anonrelay - anonymous room relay for conversational bots.
//!
//! Inbound intents from a bot transport are routed through a per-user
//! conversation state machine. Participants of a room talk under a room
//! username; every message is relayed to the other active members through
//! a durable delivery queue.

pub mod cache;
pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod http;
pub mod intent;
pub mod metrics;
pub mod state;
pub mod telemetry;
