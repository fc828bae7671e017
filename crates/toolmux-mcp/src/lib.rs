//! # Toolmux MCP Library
//!
//! MCP protocol sessions for tool-server connections:
//!
//! - Stdio: local child process speaking MCP over stdin/stdout
//! - Event stream: remote Streamable HTTP endpoint
//!
//! Sessions are transport-agnostic once established; callers list
//! capabilities and close them without caring how they were opened.

mod session;

pub use session::{McpClient, McpClientHandler, McpSession};
