//! `conduit check` command implementation.
//!
//! Parses and validates a configuration file, reports settings that are
//! legal but probably unintended, and prints the effective configuration.

use anyhow::{Context, Result};
use clap::Args;
use conduit_core::ConduitConfig;
use std::path::PathBuf;

/// Arguments for `conduit check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "conduit.yaml", env = "CONDUIT_CONFIG")]
    pub config: PathBuf,
}

/// Settings that validate but are likely mistakes.
pub fn warnings(config: &ConduitConfig) -> Vec<String> {
    let session = &config.mcp.session;
    let mut warnings = Vec::new();

    if !config.mcp.enabled {
        warnings.push("mcp.enabled is false; `conduit serve` will refuse to start".to_string());
    }
    if config.mcp.protocol_version != conduit_core::DEFAULT_PROTOCOL_VERSION {
        warnings.push(format!(
            "mcp.protocol_version '{}' differs from the supported '{}'",
            config.mcp.protocol_version,
            conduit_core::DEFAULT_PROTOCOL_VERSION
        ));
    }
    if session.keep_alive_secs >= session.timeout_secs {
        warnings.push(
            "mcp.session.keep_alive_secs is not shorter than timeout_secs; idle streams may outlive their session"
                .to_string(),
        );
    }
    if session.sweep_interval_secs > session.timeout_secs {
        warnings.push(
            "mcp.session.sweep_interval_secs exceeds timeout_secs; sessions will linger past expiry"
                .to_string(),
        );
    }
    if session.replay_log_capacity == 0 {
        warnings.push(
            "mcp.session.replay_log_capacity is 0; replay logs grow without bound".to_string(),
        );
    }
    warnings
}

/// Validate the configuration file and print the result.
pub fn run(args: CheckArgs) -> Result<()> {
    let config = ConduitConfig::from_file(&args.config)
        .with_context(|| format!("Configuration check failed for {}", args.config.display()))?;

    println!("✔ Configuration valid: {}", args.config.display());

    let warnings = warnings(&config);
    if !warnings.is_empty() {
        println!("\n⚠️  Warnings ({}):", warnings.len());
        for warning in &warnings {
            println!("   • {}", warning);
        }
    }

    println!("\n📋 Effective configuration:");
    print!("{}", config.to_yaml()?);
    Ok(())
}
