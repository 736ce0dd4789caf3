//! Broker configuration.

use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broker connection and publish settings.
///
/// Loaded once at publisher construction; immutable for the daemon's
/// lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or IP address.
    pub broker_address: String,

    /// Broker port. Default: 1883.
    #[serde(default = "default_port")]
    pub port: u16,

    /// First topic segment. Default: `worktracker`.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Seconds between periodic publishes. Default: 60.
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    /// Delivery guarantee negotiated with the broker (0, 1, or 2).
    /// Default: 1.
    #[serde(default = "default_qos")]
    pub qos: u8,

    /// Host segment of the topic. Resolved from the OS hostname when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_identifier: Option<String>,
}

const fn default_port() -> u16 {
    1883
}

fn default_topic_prefix() -> String {
    "worktracker".to_string()
}

const fn default_update_interval() -> u64 {
    60
}

const fn default_qos() -> u8 {
    1
}

/// Invalid broker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("broker_address must not be empty")]
    EmptyBrokerAddress,
    #[error("port must not be zero")]
    ZeroPort,
    #[error("topic_prefix must be non-empty with no trailing slash: {0:?}")]
    InvalidTopicPrefix(String),
    #[error("update_interval_secs must be greater than zero")]
    ZeroUpdateInterval,
    #[error("qos must be 0, 1, or 2, got {0}")]
    InvalidQos(u8),
}

impl MqttConfig {
    /// Checks all fields before any connection attempt.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_address.trim().is_empty() {
            return Err(ConfigError::EmptyBrokerAddress);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.topic_prefix.is_empty() || self.topic_prefix.ends_with('/') {
            return Err(ConfigError::InvalidTopicPrefix(self.topic_prefix.clone()));
        }
        if self.update_interval_secs == 0 {
            return Err(ConfigError::ZeroUpdateInterval);
        }
        if self.qos > 2 {
            return Err(ConfigError::InvalidQos(self.qos));
        }
        Ok(())
    }

    /// The negotiated quality-of-service level.
    ///
    /// Call [`validate`](Self::validate) first; an out-of-range value falls
    /// back to at-least-once here.
    pub const fn quality_of_service(&self) -> QoS {
        match self.qos {
            0 => QoS::AtMostOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtLeastOnce,
        }
    }

    /// The status topic for the given host identifier.
    pub fn status_topic(&self, host: &str) -> String {
        format!("{}/{}/status", self.topic_prefix, host)
    }
}
