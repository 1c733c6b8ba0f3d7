//! CLI command implementations for the Conduit MCP server.

pub mod check;
pub mod serve;
pub mod tools;
