//! # conduit-core
//!
//! Configuration types shared by the Conduit crates.

pub mod config;

pub use config::{
    ConduitConfig, ConfigError, DEFAULT_PROTOCOL_VERSION, LogFormat, LoggingConfig, McpConfig,
    SessionConfig,
};
