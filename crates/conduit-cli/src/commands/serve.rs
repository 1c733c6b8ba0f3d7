//! Serve command for starting the MCP server.
//!
//! `conduit serve` - Start the MCP Streamable HTTP server.

use crate::logging;
use anyhow::{Context, Result};
use clap::Args;
use conduit_core::ConduitConfig;
use conduit_mcp::McpServer;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Arguments for `conduit serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "conduit.yaml", env = "CONDUIT_CONFIG")]
    pub config: PathBuf,

    /// Host to bind to (overrides config).
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Idle time in seconds before a session expires (overrides config).
    #[arg(long)]
    pub session_timeout_secs: Option<u64>,
}

impl ServeArgs {
    /// Apply command-line overrides on top of the file configuration.
    pub fn apply_overrides(&self, config: &mut ConduitConfig) {
        if let Some(host) = &self.host {
            config.mcp.host = host.clone();
        }
        if let Some(port) = self.port {
            config.mcp.port = port;
        }
        if let Some(timeout) = self.session_timeout_secs {
            config.mcp.session.timeout_secs = timeout;
        }
    }
}

/// Load the configuration file, falling back to defaults when it is absent.
///
/// Returns whether the file was found.
pub fn load_config(path: &Path) -> Result<(ConduitConfig, bool)> {
    if !path.exists() {
        return Ok((ConduitConfig::default(), false));
    }
    let config = ConduitConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    Ok((config, true))
}

/// Run the MCP server until Ctrl-C.
pub async fn run(args: ServeArgs) -> Result<()> {
    let (mut config, found) = load_config(&args.config)?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    logging::init(&config.logging)?;
    if found {
        info!(config = %args.config.display(), "Loaded configuration");
    } else {
        warn!(
            config = %args.config.display(),
            "Config file not found, using defaults"
        );
    }

    let tools = super::tools::builtin_tools();
    info!(tool_count = tools.len(), "Registered built-in tools");

    McpServer::new(config.mcp)
        .with_tools(tools)
        .run()
        .await
        .context("MCP server failed")
}
