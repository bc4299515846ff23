//! Device configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use moodsoul_core::{EndpointConfig, FeedbackConfig, TriggerConfig};
use serde::Deserialize;

/// Device configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Interaction server host.
    /// Override: `MOODSOUL_SERVER_HOST`
    pub server_host: String,

    /// Interaction server port.
    /// Override: `MOODSOUL_SERVER_PORT`
    pub server_port: u16,

    /// Request path of the interaction endpoint.
    pub interact_path: String,

    /// Identifier sent with every interaction.
    /// Falls back to `moodsoul-<hostname>` when unset.
    /// Override: `MOODSOUL_DEVICE_ID`
    pub device_id: Option<String>,

    /// TCP connect deadline (milliseconds).
    pub connect_timeout_ms: u64,

    /// Response header deadline (milliseconds).
    pub header_timeout_ms: u64,

    /// Dispatcher tick period (milliseconds).
    pub tick_interval_ms: u64,

    /// JPEG served by the simulated camera.
    pub image_path: Option<PathBuf>,

    /// Directory where each response body is saved.
    pub record_dir: Option<PathBuf>,

    pub triggers: TriggerConfig,

    pub feedback: FeedbackConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let endpoint = EndpointConfig::default();
        Self {
            server_host: endpoint.host,
            server_port: endpoint.port,
            interact_path: endpoint.path,
            device_id: None,
            connect_timeout_ms: endpoint.connect_timeout_ms,
            header_timeout_ms: endpoint.header_timeout_ms,
            tick_interval_ms: moodsoul_core::Config::default().tick_interval_ms,
            image_path: None,
            record_dir: None,
            triggers: TriggerConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        // An empty file is a valid, all-defaults config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MOODSOUL_SERVER_HOST") {
            if !val.trim().is_empty() {
                self.server_host = val.trim().to_string();
            }
        }

        if let Ok(val) = std::env::var("MOODSOUL_SERVER_PORT") {
            match val.parse() {
                Ok(port) => self.server_port = port,
                Err(_) => log::warn!("Ignoring invalid MOODSOUL_SERVER_PORT={:?}", val),
            }
        }

        if let Ok(val) = std::env::var("MOODSOUL_DEVICE_ID") {
            if !val.trim().is_empty() {
                self.device_id = Some(val.trim().to_string());
            }
        }
    }

    /// Converts to moodsoul-core's Config type.
    pub fn to_core_config(&self) -> moodsoul_core::Config {
        moodsoul_core::Config {
            device_id: self.device_id.clone().unwrap_or_else(default_device_id),
            tick_interval_ms: self.tick_interval_ms,
            endpoint: EndpointConfig {
                host: self.server_host.clone(),
                port: self.server_port,
                path: self.interact_path.clone(),
                connect_timeout_ms: self.connect_timeout_ms,
                header_timeout_ms: self.header_timeout_ms,
            },
            triggers: self.triggers.clone(),
            feedback: self.feedback.clone(),
        }
    }
}

/// `moodsoul-<hostname>`, sanitized to lowercase alphanumerics and dashes.
fn default_device_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("moodsoul-{}", sanitize(&host))
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .replace([' ', '_', '.'], "-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}
