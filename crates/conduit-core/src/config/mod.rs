//! Configuration types for the Conduit MCP server.
//!
//! Configuration is loaded from a single YAML file (conventionally
//! `conduit.yaml`). Every section is optional; missing values fall back to
//! the defaults documented on each field.
//!
//! ```yaml
//! mcp:
//!   host: 0.0.0.0
//!   port: 3000
//!   session:
//!     timeout_secs: 1800
//!     replay_log_capacity: 512
//! logging:
//!   filter: conduit_mcp=debug,info
//!   format: json
//! ```

pub mod logging;
pub mod mcp;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use logging::{LogFormat, LoggingConfig};
pub use mcp::{DEFAULT_PROTOCOL_VERSION, McpConfig, SessionConfig};

/// Complete Conduit configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConduitConfig {
    /// MCP transport configuration.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Log output configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

impl ConduitConfig {
    /// Load configuration from a YAML file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content and validate it.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the effective configuration back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(ConfigError::from)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mcp = &self.mcp;
        if mcp.port == 0 {
            return Err(ConfigError::Invalid("mcp.port must be non-zero".into()));
        }
        if mcp.protocol_version.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "mcp.protocol_version must not be empty".into(),
            ));
        }

        let session = &mcp.session;
        let positive = [
            ("mcp.session.timeout_secs", session.timeout_secs),
            ("mcp.session.sweep_interval_secs", session.sweep_interval_secs),
            ("mcp.session.keep_alive_secs", session.keep_alive_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
            }
        }
        if session.push_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "mcp.session.push_channel_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
