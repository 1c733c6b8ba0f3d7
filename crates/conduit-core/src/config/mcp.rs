//! MCP server configuration.
//!
//! This module defines configuration for the MCP (Model Context Protocol)
//! Streamable HTTP transport: where it listens, which protocol version it
//! advertises, and how long sessions and their push streams live.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Protocol version advertised by the server and expected from clients.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Configuration for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Whether the MCP server is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// HTTP host to bind.
    #[serde(default = "default_http_host")]
    pub host: String,

    /// HTTP port to bind.
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Protocol version sent in the `Mcp-Protocol-Version` header.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    /// Server name reported by `initialize` and `/health`.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Serve the session-less `/`, `/rpc`, `/jsonrpc` and `/sse` endpoints.
    #[serde(default = "default_enabled")]
    pub legacy_endpoints: bool,

    /// Session lifetime and streaming settings.
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            host: default_http_host(),
            port: default_http_port(),
            protocol_version: default_protocol_version(),
            server_name: default_server_name(),
            legacy_endpoints: default_enabled(),
            session: SessionConfig::default(),
        }
    }
}

impl McpConfig {
    /// Get the `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Session registry, reaper and push-stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which the reaper removes a session.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How often the reaper sweeps the registry.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Idle bound of a push stream before a keep-alive comment is sent.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Maximum number of messages retained for replay (0 = unbounded).
    #[serde(default = "default_replay_log_capacity")]
    pub replay_log_capacity: usize,

    /// Buffered messages waiting for a push stream consumer.
    #[serde(default = "default_push_channel_capacity")]
    pub push_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            keep_alive_secs: default_keep_alive_secs(),
            replay_log_capacity: default_replay_log_capacity(),
            push_channel_capacity: default_push_channel_capacity(),
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Replay log bound, `None` when unbounded.
    pub fn replay_limit(&self) -> Option<usize> {
        (self.replay_log_capacity > 0).then_some(self.replay_log_capacity)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_protocol_version() -> String {
    DEFAULT_PROTOCOL_VERSION.to_string()
}

fn default_server_name() -> String {
    "conduit".to_string()
}

fn default_timeout_secs() -> u64 {
    30 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_replay_log_capacity() -> usize {
    1024
}

fn default_push_channel_capacity() -> usize {
    256
}
