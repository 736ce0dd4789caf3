//! MQTT publisher commands.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{Local, Utc};

use wt_core::{AccrualPolicy, IdleSource, StatusSnapshot};
use wt_db::Database;
use wt_mqtt::{MqttConfig, Publisher, StatusSource};

use crate::Config;
use crate::commands::status;
use crate::logind::LogindIdleSource;

/// Resolves and validates the broker configuration.
///
/// Runs before any network or store access.
pub fn require_mqtt(config: &Config) -> Result<MqttConfig> {
    let mqtt = config
        .mqtt
        .clone()
        .context("missing [mqtt] section in configuration")?;
    mqtt.validate().context("invalid [mqtt] configuration")?;
    Ok(mqtt)
}

/// Resolves the host identifier once: configured value first, OS hostname
/// second.
pub(crate) fn resolve_host(mqtt: &MqttConfig) -> String {
    mqtt.host_identifier.clone().unwrap_or_else(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string())
    })
}

/// Adapts the accrual read path to the publisher's seam.
struct TrackerStatus<S> {
    db: Database,
    source: S,
    policy: AccrualPolicy,
}

impl<S: IdleSource> StatusSource for TrackerStatus<S> {
    fn status(&mut self) -> Result<StatusSnapshot, Box<dyn std::error::Error + Send + Sync>> {
        status::snapshot(
            &mut self.db,
            &self.source,
            &self.policy,
            Local::now().date_naive(),
            Utc::now(),
        )
        .map_err(Into::into)
    }
}

/// Runs the publisher daemon until interrupted.
pub fn start(db: Database, policy: &AccrualPolicy, mqtt: MqttConfig) -> Result<()> {
    let host = resolve_host(&mqtt);
    let mut publisher = Publisher::new(mqtt, host);

    let handle = publisher.stop_handle();
    ctrlc::set_handler(move || handle.stop()).context("failed to install signal handler")?;

    if !publisher.connect() {
        tracing::warn!("broker unreachable at startup, continuing to retry");
    }

    let mut source = TrackerStatus {
        db,
        source: LogindIdleSource::new(),
        policy: policy.clone(),
    };
    publisher.start(&mut source);
    Ok(())
}

/// Connects, publishes one snapshot, and disconnects.
pub fn publish_once<W: Write>(
    writer: &mut W,
    mut db: Database,
    policy: &AccrualPolicy,
    mqtt: MqttConfig,
) -> Result<()> {
    let host = resolve_host(&mqtt);
    let snapshot = status::snapshot(
        &mut db,
        &LogindIdleSource::new(),
        policy,
        Local::now().date_naive(),
        Utc::now(),
    )?;

    let mut publisher = Publisher::new(mqtt, host);
    if !publisher.connect() {
        bail!("failed to connect to broker");
    }
    let published = publisher.publish_status(&snapshot);
    publisher.disconnect();

    if !published {
        bail!("failed to publish status");
    }
    writeln!(writer, "Status published.")?;
    Ok(())
}

/// Renders the publisher configuration without connecting.
pub fn show_config<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let mqtt = require_mqtt(config)?;
    let host = resolve_host(&mqtt);

    writeln!(writer, "MQTT configuration:")?;
    writeln!(writer, "  Broker: {}:{}", mqtt.broker_address, mqtt.port)?;
    writeln!(writer, "  Topic: {}", mqtt.status_topic(&host))?;
    writeln!(writer, "  Update interval: {}s", mqtt.update_interval_secs)?;
    writeln!(writer, "  QoS: {}", mqtt.qos)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wt_core::{Activity, IdleSample, IdleSourceError};

    use super::*;

    fn mqtt_config() -> MqttConfig {
        MqttConfig {
            broker_address: "192.168.1.10".to_string(),
            port: 1883,
            topic_prefix: "worktracker".to_string(),
            update_interval_secs: 60,
            qos: 1,
            host_identifier: Some("myhost".to_string()),
        }
    }

    fn config_with_mqtt(mqtt: Option<MqttConfig>) -> Config {
        Config {
            mqtt,
            ..Config::default()
        }
    }

    #[test]
    fn require_mqtt_rejects_missing_section() {
        let result = require_mqtt(&config_with_mqtt(None));
        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("missing [mqtt] section"));
    }

    #[test]
    fn require_mqtt_rejects_invalid_values() {
        let mut mqtt = mqtt_config();
        mqtt.qos = 9;
        let result = require_mqtt(&config_with_mqtt(Some(mqtt)));
        assert!(result.is_err());
    }

    #[test]
    fn resolve_host_prefers_configured_identifier() {
        assert_eq!(resolve_host(&mqtt_config()), "myhost");
    }

    #[test]
    fn resolve_host_falls_back_to_os_hostname() {
        let mut mqtt = mqtt_config();
        mqtt.host_identifier = None;
        let host = resolve_host(&mqtt);
        assert!(!host.is_empty());
    }

    #[test]
    fn show_config_renders_broker_and_topic() {
        let config = config_with_mqtt(Some(mqtt_config()));
        let mut output = Vec::new();
        show_config(&mut output, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Broker: 192.168.1.10:1883"));
        assert!(output.contains("Topic: worktracker/myhost/status"));
        assert!(output.contains("Update interval: 60s"));
        assert!(output.contains("QoS: 1"));
    }

    #[test]
    fn tracker_status_yields_snapshots_from_the_store() {
        struct AlwaysActive;
        impl IdleSource for AlwaysActive {
            fn query_idle(&self) -> Result<IdleSample, IdleSourceError> {
                Ok(IdleSample {
                    idle_time: Duration::ZERO,
                    locked: false,
                })
            }
        }

        let mut db = Database::open_in_memory().unwrap();
        let today = Local::now().date_naive();
        let now = Utc::now();
        let tick = db.tick().unwrap();
        tick.get_or_create(today, now).unwrap();
        tick.upsert(today, 3725, now).unwrap();
        tick.commit().unwrap();

        let mut source = TrackerStatus {
            db,
            source: AlwaysActive,
            policy: AccrualPolicy::default(),
        };
        let snapshot = source.status().unwrap();
        assert_eq!(snapshot.activity, Activity::Active);
        assert_eq!(snapshot.total_active_secs, 3725);
    }
}
