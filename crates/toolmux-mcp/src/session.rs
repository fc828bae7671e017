//! MCP client sessions
//!
//! One `McpSession` wraps one live rmcp client, however it was opened.
//! Stdio servers are spawned as child processes; event-stream servers are
//! reached over Streamable HTTP with caller-provided headers.

use std::collections::HashMap;
use std::process::Stdio;

use anyhow::{Context, Result};
use rmcp::{
    model::{ClientCapabilities, ClientInfo, Implementation, Tool},
    service::RunningService,
    transport::streamable_http_client::StreamableHttpClientTransportConfig,
    transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess},
    ClientHandler, RoleClient, ServiceExt,
};
use tokio::process::Command;
use tracing::{debug, info};

use toolmux_core::Capability;

/// Type alias for a connected MCP client
pub type McpClient = RunningService<RoleClient, McpClientHandler>;

/// Client handler identifying toolmux to the remote server
#[derive(Clone)]
pub struct McpClientHandler {
    info: ClientInfo,
}

impl McpClientHandler {
    pub fn new(server_name: &str) -> Self {
        Self {
            info: ClientInfo {
                protocol_version: Default::default(),
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: format!("toolmux-{}", server_name),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: Some("Toolmux Connection Manager".to_string()),
                    description: None,
                    icons: None,
                    website_url: None,
                },
                meta: None,
            },
        }
    }
}

impl ClientHandler for McpClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }
}

/// A connected MCP client session for one tool server
pub struct McpSession {
    server_name: String,
    client: McpClient,
}

impl McpSession {
    /// Connect to a stdio tool server by spawning its command.
    pub async fn connect_stdio(
        server_name: impl Into<String>,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self> {
        let server_name = server_name.into();

        // The command may carry embedded arguments ("npx -y @scope/server"),
        // common in configs copied from editor mcp.json files.
        let (executable, parsed_args) = parse_command(command, args)?;

        info!(
            server = %server_name,
            executable = %executable,
            args = ?parsed_args,
            "Connecting to stdio tool server"
        );

        let args_for_closure = parsed_args.clone();
        let env = env.clone();

        let transport = TokioChildProcess::new(Command::new(&executable).configure(move |cmd| {
            cmd.args(&args_for_closure)
                .envs(&env)
                .stderr(Stdio::null())
                .kill_on_drop(true);

            // Unix: new process group so terminal signals sent to the host
            // process don't propagate to tool-server children.
            #[cfg(unix)]
            {
                cmd.process_group(0);
            }
            #[cfg(windows)]
            {
                const CREATE_NO_WINDOW: u32 = 0x08000000;
                cmd.creation_flags(CREATE_NO_WINDOW);
            }
        }))
        .context(format!(
            "Failed to spawn child process. Command not found: {}. Ensure it's installed and in PATH.",
            executable
        ))?;

        let client = McpClientHandler::new(&server_name)
            .serve(transport)
            .await
            .context("MCP handshake failed")?;

        debug!(server = %server_name, peer_info = ?client.peer_info(), "Stdio tool server connected");

        Ok(Self {
            server_name,
            client,
        })
    }

    /// Connect to an event-stream tool server over Streamable HTTP.
    ///
    /// `headers` are applied to every request as client default headers.
    pub async fn connect_event_stream(
        server_name: impl Into<String>,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Self> {
        let server_name = server_name.into();

        url::Url::parse(url).context("Invalid tool server URL")?;

        info!(
            server = %server_name,
            url = %url,
            header_count = headers.len(),
            "Connecting to event-stream tool server"
        );

        let header_map = build_header_map(headers)?;
        let http_client = reqwest::Client::builder()
            .default_headers(header_map)
            .build()
            .context("Failed to build HTTP client")?;

        let transport_config = StreamableHttpClientTransportConfig::with_uri(url);
        let transport = StreamableHttpClientTransport::with_client(http_client, transport_config);

        let client = McpClientHandler::new(&server_name)
            .serve(transport)
            .await
            .context("MCP handshake failed")?;

        debug!(server = %server_name, peer_info = ?client.peer_info(), "Event-stream tool server connected");

        Ok(Self {
            server_name,
            client,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// List the server's callable capabilities.
    pub async fn capabilities(&self) -> Result<Vec<Capability>> {
        let result = self
            .client
            .peer()
            .list_tools(Default::default())
            .await
            .context("Failed to list tools")?;

        debug!(
            server = %self.server_name,
            tool_count = result.tools.len(),
            "Listed tool server capabilities"
        );

        Ok(result.tools.iter().map(to_capability).collect())
    }

    /// Gracefully close the session.
    pub async fn close(self) -> Result<()> {
        info!(server = %self.server_name, "Closing tool server session");
        self.client
            .cancel()
            .await
            .context("Failed to cancel service")?;
        Ok(())
    }
}

fn to_capability(tool: &Tool) -> Capability {
    Capability {
        name: tool.name.to_string(),
        description: tool.description.as_ref().map(|d| d.to_string()),
        input_schema: serde_json::Value::Object(tool.input_schema.as_ref().clone()),
    }
}

/// Build a reqwest `HeaderMap` from config-provided header values.
fn build_header_map(headers: &HashMap<String, String>) -> Result<reqwest::header::HeaderMap> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (key, value) in headers {
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
            .with_context(|| format!("Invalid header name '{}'", key))?;
        let val = reqwest::header::HeaderValue::from_str(value)
            .with_context(|| format!("Invalid header value for '{}'", key))?;
        header_map.insert(name, val);
    }
    Ok(header_map)
}

/// Split a command string that may contain embedded arguments.
///
/// - "docker run -i --rm image" → ("docker", ["run", "-i", "--rm", "image"])
/// - "npx -y @some/server" → ("npx", ["-y", "@some/server"])
/// - "node" with args ["server.js"] → ("node", ["server.js"])
///
/// When separate args are provided the command is taken as the bare
/// executable; otherwise embedded arguments are parsed with shell quoting.
fn parse_command(command: &str, args: &[String]) -> Result<(String, Vec<String>)> {
    if !args.is_empty() {
        return Ok((command.to_string(), args.to_vec()));
    }

    if command.contains(' ') {
        let parts = shell_words::split(command)
            .context("Failed to parse command string - check for unmatched quotes")?;

        if parts.is_empty() {
            anyhow::bail!("Empty command after parsing");
        }

        Ok((parts[0].clone(), parts[1..].to_vec()))
    } else {
        Ok((command.to_string(), Vec::new()))
    }
}
