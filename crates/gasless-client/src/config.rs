//! Client configuration, loaded from a JSON file

use std::fs;
use std::str::FromStr;
use std::time::Duration;

use gasless_primitives::chains::{ChainDescriptor, ChainRegistry};
use serde::Deserialize;
use thiserror::Error;
use tracing::Level;
use url::Url;

pub const DEFAULT_GAS_BUFFER_BPS: u64 = 2_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub relay_url: String,
    /// product name embedded in the session key delegation message
    pub product_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_session_duration")]
    pub session_duration_seconds: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// how long a wallet prompt may stay unanswered
    #[serde(default = "default_signature_timeout")]
    pub signature_timeout_seconds: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_max_nonce_refreshes")]
    pub max_nonce_refreshes: u32,
    #[serde(default = "default_gas_buffer_bps")]
    pub gas_buffer_bps: u64,
    /// origin the session keys are scoped to
    #[serde(default = "default_origin")]
    pub origin: String,
    pub chains: Vec<ChainDescriptor>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),
    #[error("Failed to parse JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),
    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("Failed to parse log level: {0}")]
    LogLevelParseError(String),
    #[error("Invalid chain configuration: {0}")]
    ChainError(#[from] gasless_primitives::PrimitivesError),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_session_duration() -> u64 {
    30 * 60
}

fn default_request_timeout() -> u64 {
    20
}

fn default_signature_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_nonce_refreshes() -> u32 {
    3
}

fn default_gas_buffer_bps() -> u64 {
    DEFAULT_GAS_BUFFER_BPS
}

fn default_origin() -> String {
    "default".to_string()
}

impl ClientConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.relay_url()?;
        if self.product_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue("productName is empty".into()));
        }
        if self.session_duration_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "sessionDurationSeconds must be positive".into(),
            ));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "requestTimeoutSeconds must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn relay_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.relay_url).map_err(ConfigError::from)
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::LogLevelParseError(self.log_level.clone()))
    }

    pub fn chain_registry(&self) -> Result<ChainRegistry, ConfigError> {
        Ok(ChainRegistry::new(self.chains.clone())?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn signature_timeout(&self) -> Duration {
        Duration::from_secs(self.signature_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_seconds)
    }
}
