//! Gate configuration

use crate::error::FayeAuthResult;
use crate::{config_error, validation_error};
use crate::policy::Whitelist;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "/faye/auth";
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Construction-time settings of an authentication gate
///
/// The whitelist is code-only and never read from or written to a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Path (or absolute URL) of the authentication endpoint
    pub endpoint: String,
    /// Fixed delay between a failed attempt and the next one, in milliseconds
    pub retry_delay: u64,
    /// Upper bound on one authentication round trip, in milliseconds
    pub request_timeout_ms: u64,
    #[serde(skip)]
    pub whitelist: Option<Whitelist>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            retry_delay: DEFAULT_RETRY_DELAY_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            whitelist: None,
        }
    }
}

impl GateConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry_delay(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay = retry_delay_ms;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout_ms: u64) -> Self {
        self.request_timeout_ms = request_timeout_ms;
        self
    }

    pub fn with_whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    pub fn retry_delay_duration(&self) -> Duration {
        Duration::from_millis(self.retry_delay)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> FayeAuthResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            config_error!(format!("Failed to read config file: {}", e), "config", e)
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable")
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> FayeAuthResult<Self> {
        let config: GateConfig = toml::from_str(content).map_err(|e| {
            config_error!(format!("Failed to parse config: {}", e), "config", e)
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file")
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> FayeAuthResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            config_error!(format!("Failed to serialize config: {}", e), "config", e)
                .with_operation("serialize_toml")
        })?;

        std::fs::write(path, content).map_err(|e| {
            config_error!(format!("Failed to write config file: {}", e), "config", e)
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable")
        })?;

        Ok(())
    }

    pub fn validate(&self) -> FayeAuthResult<()> {
        let endpoint = self.endpoint.trim();
        let is_url = endpoint.starts_with("http://") || endpoint.starts_with("https://");

        if endpoint.is_empty() || !(endpoint.starts_with('/') || is_url) {
            return Err(validation_error!(
                format!(
                    "Endpoint must be an absolute path or http(s) URL, got '{}'",
                    self.endpoint
                ),
                "endpoint",
                "config"
            )
            .with_operation("validate")
            .with_suggestion("Use a path such as /faye/auth"));
        }

        if self.request_timeout_ms == 0 {
            return Err(validation_error!(
                "request_timeout_ms must be greater than 0",
                "request_timeout_ms",
                "config"
            )
            .with_operation("validate")
            .with_suggestion("Set request_timeout_ms to a positive value"));
        }

        Ok(())
    }
}
