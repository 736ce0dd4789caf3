//! Resilient periodic publisher.
//!
//! One thread runs the publish loop, a second drives the network session.
//! The driver embodies the connection state machine: on loss it retries
//! with exponential backoff until the stop token is set; the loop itself
//! never terminates on a network error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rumqttc::{Client, Connection, ConnectReturnCode, Event, MqttOptions, Packet};

use wt_core::StatusSnapshot;

use crate::config::MqttConfig;
use crate::payload::StatusPayload;

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_CEILING: Duration = Duration::from_secs(60);
const CONNECT_WAIT: Duration = Duration::from_secs(10);
const POLL_SLICE: Duration = Duration::from_millis(250);
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CHANNEL_CAPACITY: usize = 16;

/// Read side of the publish loop.
///
/// The accrual side implements this; the publisher only ever reads
/// snapshots through it and never touches the counter.
pub trait StatusSource {
    fn status(&mut self) -> Result<StatusSnapshot, Box<dyn std::error::Error + Send + Sync>>;
}

/// Cancellation token for the publish loop.
///
/// Cloneable and settable from a signal handler; setting it is the only
/// side effect, the loop does the actual teardown.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns the broker session and the periodic publish loop.
pub struct Publisher {
    config: MqttConfig,
    host: String,
    client: Option<Client>,
    driver: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl Publisher {
    /// Creates a publisher for a validated configuration.
    ///
    /// `host` is the resolved host identifier used in the topic; it is
    /// fixed here and never looked up again.
    pub fn new(config: MqttConfig, host: impl Into<String>) -> Self {
        Self {
            config,
            host: host.into(),
            client: None,
            driver: None,
            connected: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a token that requests loop termination when set.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    /// Opens a session to the configured broker.
    ///
    /// Returns whether the broker acknowledged within a bounded wait.
    /// Either way the driver thread keeps retrying in the background until
    /// [`stop`](Self::stop), so a daemon started against an unreachable
    /// broker converges once the broker appears.
    pub fn connect(&mut self) -> bool {
        self.disconnect();
        self.stop.store(false, Ordering::SeqCst);

        let mut options = MqttOptions::new(
            format!("wt-{}", self.host),
            self.config.broker_address.clone(),
            self.config.port,
        );
        options.set_keep_alive(KEEP_ALIVE);
        let (client, connection) = Client::new(options, REQUEST_CHANNEL_CAPACITY);

        let connected = Arc::clone(&self.connected);
        let stop = Arc::clone(&self.stop);
        let driver = thread::Builder::new()
            .name("wt-mqtt-driver".to_string())
            .spawn(move || drive(connection, &connected, &stop));
        let driver = match driver {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!(error = %err, "failed to spawn connection driver");
                return false;
            }
        };
        self.client = Some(client);
        self.driver = Some(driver);

        let deadline = Instant::now() + CONNECT_WAIT;
        while Instant::now() < deadline && !self.stop.load(Ordering::SeqCst) {
            if self.connected.load(Ordering::SeqCst) {
                return true;
            }
            thread::sleep(POLL_SLICE);
        }
        tracing::warn!(
            broker = %self.config.broker_address,
            port = self.config.port,
            "broker did not acknowledge in time"
        );
        false
    }

    /// Publishes a snapshot as a retained message on the status topic.
    ///
    /// Returns success/failure; ordinary connectivity failure is a log
    /// line, never an error value.
    pub fn publish_status(&self, snapshot: &StatusSnapshot) -> bool {
        let Some(client) = self.client.as_ref() else {
            tracing::warn!("publish skipped: no broker session");
            return false;
        };
        if !self.connected.load(Ordering::SeqCst) {
            tracing::warn!("publish skipped: broker session down");
            return false;
        }
        let payload = StatusPayload::from(snapshot);
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize status payload");
                return false;
            }
        };
        let topic = self.config.status_topic(&self.host);
        match client.publish(&topic, self.config.quality_of_service(), true, body) {
            Ok(()) => {
                tracing::debug!(%topic, total_time = payload.total_time, "status published");
                true
            }
            Err(err) => {
                tracing::warn!(%topic, error = %err, "publish failed");
                false
            }
        }
    }

    /// Runs the periodic publish loop until stopped.
    ///
    /// Every `update_interval_secs` the loop pulls a fresh snapshot and
    /// publishes it. Failed reads and failed publishes are logged; the
    /// next interval retries naturally. Sleeps in short slices so a stop
    /// request is observed within one slice.
    pub fn start<S: StatusSource>(&mut self, source: &mut S) {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            interval_secs = self.config.update_interval_secs,
            "publish loop started"
        );
        while !self.stop.load(Ordering::SeqCst) {
            match source.status() {
                Ok(snapshot) => {
                    let _ = self.publish_status(&snapshot);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "status query failed, skipping this interval");
                }
            }
            sleep_unless_stopped(
                &self.stop,
                Duration::from_secs(self.config.update_interval_secs),
            );
        }
        self.disconnect();
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("publish loop stopped");
    }

    /// Requests loop termination. Idempotent, safe from a signal handler.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Whether the publish loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Closes the broker session and joins the driver thread.
    pub fn disconnect(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if let Some(client) = self.client.take() {
            // Wakes the driver; a session that is already dead is fine.
            let _ = client.disconnect();
        }
        if let Some(driver) = self.driver.take() {
            let _ = driver.join();
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Drives the network session until the stop token is set.
fn drive(mut connection: Connection, connected: &AtomicBool, stop: &AtomicBool) {
    let mut backoff = BACKOFF_INITIAL;
    for event in connection.iter() {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    connected.store(true, Ordering::SeqCst);
                    backoff = BACKOFF_INITIAL;
                    tracing::info!("connected to broker");
                } else {
                    connected.store(false, Ordering::SeqCst);
                    tracing::warn!(code = ?ack.code, "broker refused connection");
                }
            }
            Ok(_) => {}
            Err(err) => {
                connected.store(false, Ordering::SeqCst);
                tracing::warn!(error = %err, retry_in = ?backoff, "broker connection lost");
                sleep_unless_stopped(stop, backoff);
                backoff = next_backoff(backoff);
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(BACKOFF_CEILING)
}

/// Sleeps for `total`, waking early if the stop token is set.
fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::SeqCst) {
        let slice = remaining.min(POLL_SLICE);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
