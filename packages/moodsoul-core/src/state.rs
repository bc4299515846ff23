//! Device configuration types.
//!
//! [`Config`] holds everything the runtime needs that is not a hardware
//! collaborator: the endpoint, gesture thresholds and feedback timing. The
//! device binary builds it from YAML, environment and CLI layers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol_constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HEADER_TIMEOUT_MS, DEFAULT_INTERACT_PATH,
};

/// Where interactions are sent.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    /// Server host name or IP address.
    pub host: String,

    /// Server TCP port.
    pub port: u16,

    /// Request path for the interaction endpoint.
    pub path: String,

    /// Deadline for establishing the TCP connection (milliseconds).
    pub connect_timeout_ms: u64,

    /// Deadline for the complete response header block (milliseconds).
    pub header_timeout_ms: u64,
}

impl EndpointConfig {
    /// `host:port` as used for connecting and logging.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Value of the `Host` request header. The port is omitted when it is 80.
    #[must_use]
    pub fn host_header(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            self.addr()
        }
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn header_timeout(&self) -> Duration {
        Duration::from_millis(self.header_timeout_ms)
    }

    /// Validates the endpoint values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError("endpoint.host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError("endpoint.port must be >= 1".into()));
        }
        if !self.path.starts_with('/') {
            return Err(ConfigError(format!(
                "endpoint.path must start with '/' (got {:?})",
                self.path
            )));
        }
        if self.path.contains(char::is_whitespace) {
            return Err(ConfigError("endpoint.path must not contain whitespace".into()));
        }
        if self.connect_timeout_ms == 0 || self.header_timeout_ms == 0 {
            return Err(ConfigError("endpoint timeouts must be >= 1 ms".into()));
        }
        Ok(())
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            path: DEFAULT_INTERACT_PATH.into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            header_timeout_ms: DEFAULT_HEADER_TIMEOUT_MS,
        }
    }
}

/// Gesture thresholds and debounce windows.
///
/// Accelerations are in g. The device's z axis points up when it rests
/// upright.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TriggerConfig {
    /// `|ax|` above this is a shake.
    pub shake_threshold_g: f32,

    /// Minimum time between two shake interactions (milliseconds).
    pub shake_debounce_ms: u64,

    /// `az` below this means upside down.
    pub upside_down_z: f32,

    /// `az` above this means upright again.
    pub upright_z: f32,

    /// Enable observation while charging.
    pub auto_observe: bool,

    /// `|ax|` or `|ay|` above this counts as vibration while charging.
    pub vibration_threshold_g: f32,

    /// Vibration must persist longer than this before observing (milliseconds).
    pub vibration_hold_ms: u64,

    /// Minimum time between two observations (milliseconds).
    pub auto_observe_interval_ms: u64,
}

impl TriggerConfig {
    #[must_use]
    pub fn shake_debounce(&self) -> Duration {
        Duration::from_millis(self.shake_debounce_ms)
    }

    #[must_use]
    pub fn vibration_hold(&self) -> Duration {
        Duration::from_millis(self.vibration_hold_ms)
    }

    #[must_use]
    pub fn auto_observe_interval(&self) -> Duration {
        Duration::from_millis(self.auto_observe_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.shake_threshold_g > 0.0) {
            return Err(ConfigError("triggers.shake_threshold_g must be > 0".into()));
        }
        if !(self.vibration_threshold_g > 0.0) {
            return Err(ConfigError(
                "triggers.vibration_threshold_g must be > 0".into(),
            ));
        }
        // Equal thresholds would toggle the edge on every reading near the limit
        if !(self.upright_z > self.upside_down_z) {
            return Err(ConfigError(format!(
                "triggers.upright_z ({}) must be greater than triggers.upside_down_z ({})",
                self.upright_z, self.upside_down_z
            )));
        }
        Ok(())
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            shake_threshold_g: 2.5,
            shake_debounce_ms: 3000,
            upside_down_z: -0.9,
            upright_z: 0.5,
            auto_observe: true,
            vibration_threshold_g: 1.2,
            vibration_hold_ms: 2000,
            auto_observe_interval_ms: 300_000,
        }
    }
}

/// Timing of on-screen feedback.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FeedbackConfig {
    /// How long a failure label stays up before returning to Ready (milliseconds).
    pub failure_hold_ms: u64,

    /// How long the dizzy face stays up after a shake (milliseconds).
    pub dizzy_hold_ms: u64,

    /// Battery percentage below which no interaction is started.
    pub low_battery_percent: u8,

    /// Pause after showing the low-battery label (milliseconds).
    pub low_battery_pause_ms: u64,
}

impl FeedbackConfig {
    #[must_use]
    pub fn failure_hold(&self) -> Duration {
        Duration::from_millis(self.failure_hold_ms)
    }

    #[must_use]
    pub fn dizzy_hold(&self) -> Duration {
        Duration::from_millis(self.dizzy_hold_ms)
    }

    #[must_use]
    pub fn low_battery_pause(&self) -> Duration {
        Duration::from_millis(self.low_battery_pause_ms)
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            failure_hold_ms: 2000,
            dizzy_hold_ms: 2000,
            low_battery_percent: 20,
            low_battery_pause_ms: 5000,
        }
    }
}

/// Configuration for a MoodSoul device.
///
/// All fields have sensible defaults except `device_id`, which the caller
/// is expected to fill in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Identifier sent in the `deviceId` part of every interaction.
    pub device_id: String,

    /// Dispatcher tick period (milliseconds).
    pub tick_interval_ms: u64,

    pub endpoint: EndpointConfig,

    pub triggers: TriggerConfig,

    pub feedback: FeedbackConfig,
}

impl Config {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.trim().is_empty() {
            return Err(ConfigError("device_id must not be empty".into()));
        }
        // The id is written verbatim into a text part of the body
        if self.device_id.contains(['\r', '\n']) {
            return Err(ConfigError("device_id must be a single line".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError("tick_interval_ms must be >= 1".into()));
        }
        self.endpoint.validate()?;
        self.triggers.validate()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            tick_interval_ms: 20,
            endpoint: EndpointConfig::default(),
            triggers: TriggerConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}
