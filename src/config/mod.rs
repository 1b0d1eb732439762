//! Configuration management
//!
//! Settings come from `BLAZE_MCP_*` environment variables layered over the
//! defaults below. Command line flags in the binary override the transport
//! related fields afterwards.

use std::fmt;
use std::time::Duration;

use ::config::{Config, Environment};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix shared by every environment variable the server reads.
pub const ENV_PREFIX: &str = "BLAZE_MCP";

/// Inbound transport used to talk to the MCP client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Newline-delimited JSON-RPC on stdin/stdout
    #[default]
    Stdio,
    /// Server-sent events over HTTP
    Sse,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Stdio => f.write_str("stdio"),
            TransportMode::Sse => f.write_str("sse"),
        }
    }
}

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Blaze FHIR base URL used until a tool call switches it
    pub blaze_base_url: String,
    /// Request timeout in seconds applied to every pooled HTTP client
    pub blaze_timeout: f64,
    /// Expose the maintenance tools (totals, compaction, re-index)
    pub admin_tools_enabled: bool,
    /// Page size used when a search does not ask for one
    pub default_page_size: i64,
    /// Upper bound for any requested page size
    pub max_page_size: i64,
    /// Inbound transport
    pub transport: TransportMode,
    /// Bind host for the SSE transport
    pub host: String,
    /// Bind port for the SSE transport
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            blaze_base_url: "http://localhost:8080/fhir".to_string(),
            blaze_timeout: 30.0,
            admin_tools_enabled: true,
            default_page_size: 20,
            max_page_size: 100,
            transport: TransportMode::Stdio,
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment and validate it.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration from an explicit environment source.
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        let loaded: ServerConfig = Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !has_http_scheme(&self.blaze_base_url) {
            return Err(ConfigError::Invalid(format!(
                "blaze_base_url '{}' must start with http:// or https://",
                self.blaze_base_url
            )));
        }
        if !(self.blaze_timeout > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "blaze_timeout must be positive, got {}",
                self.blaze_timeout
            )));
        }
        if self.max_page_size <= 0 {
            return Err(ConfigError::Invalid(format!(
                "max_page_size must be positive, got {}",
                self.max_page_size
            )));
        }
        if self.default_page_size < 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_page_size {} must be between 0 and max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }

    /// Request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.blaze_timeout)
    }

    /// Effective page size for a search.
    ///
    /// Falls back to `default_page_size` and never exceeds `max_page_size`.
    /// Zero means the `_count` parameter is left off.
    pub fn page_size(&self, requested: Option<i64>) -> u32 {
        let count = requested
            .unwrap_or(self.default_page_size)
            .clamp(0, self.max_page_size);
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// True when `url` uses an `http://` or `https://` scheme.
pub fn has_http_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
