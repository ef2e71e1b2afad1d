//! Client settings read from the environment

use crate::ingest::ReconnectPolicy;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";
pub const LOG_FILE: &str = "aegis-chat.log";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("AEGIS_WS_URL must start with ws:// or wss://, got {0:?}")]
    InvalidEndpoint(String),
    #[error("{var} must be true or false, got {value:?}")]
    InvalidBool { var: &'static str, value: String },
    #[error("{var} must be a whole number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub data_dir: PathBuf,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = lookup("AEGIS_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(ConfigError::InvalidEndpoint(endpoint));
        }

        let data_dir = lookup("AEGIS_DATA_DIR").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".aegis-chat")
            },
            PathBuf::from,
        );

        let mut reconnect = ReconnectPolicy::default();
        if let Some(value) = lookup("AEGIS_RECONNECT") {
            reconnect.enabled = parse_bool("AEGIS_RECONNECT", &value)?;
        }
        if let Some(value) = lookup("AEGIS_RECONNECT_MAX_SECS") {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "AEGIS_RECONNECT_MAX_SECS",
                    value: value.clone(),
                })?;
            reconnect.max_delay = Duration::from_secs(secs).max(reconnect.initial_delay);
        }

        Ok(Self {
            endpoint,
            data_dir,
            reconnect,
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_string(),
        }),
    }
}
