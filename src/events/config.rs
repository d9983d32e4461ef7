use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for the caption event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventStreamConfig {
    /// Path joined onto the signaling base URL
    pub path: String,

    /// Interval between outbound heartbeats; 0 disables the heartbeat timer
    pub heartbeat_interval_ms: u64,

    /// Payload sent on each heartbeat tick; None disables the heartbeat timer
    pub heartbeat_payload: Option<String>,

    /// First reconnect delay
    pub initial_retry_delay_ms: u64,

    /// Ceiling for the reconnect delay
    pub max_retry_delay_ms: u64,

    /// Growth factor applied to the delay after each scheduled reconnect
    pub retry_multiplier: f64,

    /// Random jitter added to each scheduled delay is drawn from [0, ceiling)
    pub jitter_ceiling_ms: u64,

    /// Reconnects allowed before the stream gives up; 0 means unlimited
    pub max_reconnect_attempts: u32,

    /// Treat malformed event payloads as a terminal stream error instead of
    /// dropping them
    pub strict_deserialization: bool,
}

impl EventStreamConfig {
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        if self.heartbeat_interval_ms == 0 || self.heartbeat_payload.is_none() {
            return None;
        }
        Some(Duration::from_millis(self.heartbeat_interval_ms))
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

impl Default for EventStreamConfig {
    fn default() -> Self {
        Self {
            path: "session/events".to_string(),
            heartbeat_interval_ms: 15_000,
            heartbeat_payload: Some("{\"type\":\"client.heartbeat\"}".to_string()),
            initial_retry_delay_ms: 1_000,
            max_retry_delay_ms: 30_000,
            retry_multiplier: 2.0,
            jitter_ceiling_ms: 250,
            max_reconnect_attempts: 0,
            strict_deserialization: false,
        }
    }
}
