//! Transport seam between the pool and the MCP protocol layer
//!
//! The cache, connector, and prober only ever see the `ClientFactory` and
//! `ToolClient` traits; the production implementation delegates to
//! `toolmux-mcp` sessions. Transport kinds form a closed variant set with
//! exhaustive dispatch at the factory boundary, so adding a kind cannot
//! silently fall through.

mod mcp_client;

pub use mcp_client::{McpClientFactory, McpToolClient};

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use toolmux_core::{Capability, TransportType};

/// A live client connection to one tool server.
#[async_trait]
pub trait ToolClient: Send + Sync {
    /// List the server's callable capabilities.
    async fn list_capabilities(&self) -> Result<Vec<Capability>>;

    /// Gracefully close the connection.
    ///
    /// Safe to call more than once; only the first call tears the session
    /// down, later calls are no-ops.
    async fn close(&self) -> Result<()>;
}

/// Creates live clients from resolved transport parameters.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create(
        &self,
        server_name: &str,
        transport: &ResolvedTransport,
    ) -> Result<Box<dyn ToolClient>>;
}

/// Transport parameters ready for connection.
///
/// All `${input:<id>}` placeholders have been replaced with the user's
/// secret values. Distinct from `toolmux_core::TransportSpec`, which is the
/// stored template form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTransport {
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    EventStream {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl ResolvedTransport {
    pub fn transport_type(&self) -> TransportType {
        match self {
            ResolvedTransport::Stdio { .. } => TransportType::Stdio,
            ResolvedTransport::EventStream { .. } => TransportType::EventStream,
        }
    }

    /// Command path or URL, for logging and status records.
    pub fn endpoint(&self) -> &str {
        match self {
            ResolvedTransport::Stdio { command, .. } => command,
            ResolvedTransport::EventStream { url, .. } => url,
        }
    }
}
