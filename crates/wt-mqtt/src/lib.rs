//! MQTT integration for the work tracker.
//!
//! Publishes the daily status snapshot as a retained message for
//! home-automation consumers. Provides:
//! - A validated broker configuration
//! - The published payload format
//! - A resilient periodic publish loop with reconnect/backoff

mod config;
mod payload;
mod publisher;

pub use config::{ConfigError, MqttConfig};
pub use payload::StatusPayload;
pub use publisher::{Publisher, StatusSource, StopHandle};
