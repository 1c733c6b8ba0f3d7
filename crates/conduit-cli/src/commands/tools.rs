//! Tools introspection command and the server's built-in tools.
//!
//! `conduit tools` - List the tools `conduit serve` exposes.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use conduit_mcp::{McpError, ToolDefinition, ToolRegistry};
use serde_json::{Value, json};

/// Arguments for `conduit tools`.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Show each tool's input schema.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Tools served by `conduit serve`.
pub fn builtin_tools() -> ToolRegistry {
    let mut tools = ToolRegistry::new();

    tools.register_fn(
        ToolDefinition {
            name: "echo".to_string(),
            description: "Return the given message unchanged".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "Text to echo back"}
                },
                "required": ["message"]
            }),
        },
        |args: Value| async move {
            match args.get("message") {
                Some(Value::String(message)) => Ok(Value::String(message.clone())),
                _ => Err(McpError::invalid_params("'message' must be a string")),
            }
        },
    );

    tools.register_fn(
        ToolDefinition {
            name: "server_time".to_string(),
            description: "Current server time in RFC 3339 format (UTC)".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        |_| async { Ok(Value::String(Utc::now().to_rfc3339())) },
    );

    tools
}

/// Print the built-in tools.
pub fn list(args: ToolsArgs) -> Result<()> {
    let tools = builtin_tools();

    println!("\n🔧 Available Tools ({}):", tools.len());
    for name in tools.names() {
        let Some(tool) = tools.get(name) else {
            continue;
        };
        println!("   • {}", tool.name);
        println!("     {}", tool.description);

        if args.verbose {
            println!(
                "     Schema: {}",
                serde_json::to_string_pretty(&tool.input_schema)?
            );
        }
    }
    println!();

    Ok(())
}
