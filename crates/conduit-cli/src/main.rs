use clap::{Parser, Subcommand};
use conduit_core::LoggingConfig;

mod commands;
mod logging;

use commands::{check::CheckArgs, serve::ServeArgs, tools::ToolsArgs};

#[derive(Parser, Debug)]
#[command(name = "conduit", version, about = "Conduit MCP server")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the MCP Streamable HTTP server.
    Serve(ServeArgs),

    /// Validate a configuration file and print the effective settings.
    Check(CheckArgs),

    /// List the tools the server exposes.
    Tools(ToolsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        // Logging for `serve` comes from its configuration file.
        Command::Serve(args) => commands::serve::run(args).await?,
        Command::Check(args) => {
            logging::init(&LoggingConfig::default())?;
            commands::check::run(args)?
        }
        Command::Tools(args) => {
            logging::init(&LoggingConfig::default())?;
            commands::tools::list(args)?
        }
    }

    Ok(())
}
