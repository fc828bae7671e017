//! rmcp-backed `ClientFactory` and `ToolClient` implementations

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use toolmux_core::Capability;
use toolmux_mcp::McpSession;

use super::{ClientFactory, ResolvedTransport, ToolClient};

/// Production factory connecting over real MCP transports.
pub struct McpClientFactory {
    connect_timeout: Duration,
}

impl McpClientFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl ClientFactory for McpClientFactory {
    async fn create(
        &self,
        server_name: &str,
        transport: &ResolvedTransport,
    ) -> Result<Box<dyn ToolClient>> {
        let connect = async {
            match transport {
                ResolvedTransport::Stdio { command, args, env } => {
                    McpSession::connect_stdio(server_name, command, args, env).await
                }
                ResolvedTransport::EventStream { url, headers } => {
                    McpSession::connect_event_stream(server_name, url, headers).await
                }
            }
        };

        let session = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| {
                anyhow::anyhow!("Connection timeout ({:?})", self.connect_timeout)
            })?
            .context("Failed to connect to tool server")?;

        Ok(Box::new(McpToolClient::new(session)))
    }
}

/// A live MCP session behind the `ToolClient` trait.
///
/// The session sits in a take-once slot so `close` tears it down exactly
/// once even when eviction and explicit disconnect race.
pub struct McpToolClient {
    server_name: String,
    session: Mutex<Option<McpSession>>,
}

impl McpToolClient {
    fn new(session: McpSession) -> Self {
        Self {
            server_name: session.server_name().to_string(),
            session: Mutex::new(Some(session)),
        }
    }
}

#[async_trait]
impl ToolClient for McpToolClient {
    async fn list_capabilities(&self) -> Result<Vec<Capability>> {
        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Session already closed: {}", self.server_name))?;
        session.capabilities().await
    }

    async fn close(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        match session {
            Some(session) => {
                info!(server = %self.server_name, "Closing tool client");
                session.close().await
            }
            None => {
                debug!(server = %self.server_name, "Tool client already closed");
                Ok(())
            }
        }
    }
}
