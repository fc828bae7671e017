use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Precedence level of a configuration source.
///
/// `User` overrides `Role`, which overrides `Global`. The derived `Ord`
/// encodes exactly that precedence (`Global < Role < User`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ConfigTier {
    #[default]
    Global,
    Role,
    User,
}

impl ConfigTier {
    /// Human-readable source label used in status records and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ConfigTier::Global => "Global",
            ConfigTier::Role => "Role",
            ConfigTier::User => "User",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Stdio,
    EventStream,
}

/// Transport definition for one tool server.
///
/// A closed variant set: adding a new kind forces every dispatch site to
/// handle it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportSpec {
    /// Local child process speaking over stdin/stdout.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// Remote HTTP(S) endpoint with an event-stream response channel.
    EventStream {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl TransportSpec {
    pub fn transport_type(&self) -> TransportType {
        match self {
            TransportSpec::Stdio { .. } => TransportType::Stdio,
            TransportSpec::EventStream { .. } => TransportType::EventStream,
        }
    }

    /// The command path or URL identifying this transport's endpoint.
    pub fn endpoint(&self) -> &str {
        match self {
            TransportSpec::Stdio { command, .. } => command,
            TransportSpec::EventStream { url, .. } => url,
        }
    }
}

/// One tool-server definition as produced by a Config Store.
///
/// Immutable once resolved for a request. `name` is unique
/// (case-insensitively) within one precedence-resolved set; collisions
/// across tiers are settled by the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub enabled: bool,
    pub tier: ConfigTier,
    pub transport: TransportSpec,
}

impl ServerConfig {
    /// Build a stdio config from stored row fields.
    ///
    /// `args_json` and `env_json` are the raw stored JSON columns; malformed
    /// JSON normalizes to an empty list/map rather than failing the row.
    pub fn stdio_from_stored(
        name: impl Into<String>,
        enabled: bool,
        tier: ConfigTier,
        command: impl Into<String>,
        args_json: Option<&str>,
        env_json: Option<&str>,
    ) -> Self {
        let name = name.into();
        Self {
            transport: TransportSpec::Stdio {
                command: command.into(),
                args: list_from_stored(args_json, &name, "args"),
                env: map_from_stored(env_json, &name, "env"),
            },
            name,
            enabled,
            tier,
        }
    }

    /// Build an event-stream config from stored row fields.
    ///
    /// Malformed `headers_json` normalizes to an empty map.
    pub fn event_stream_from_stored(
        name: impl Into<String>,
        enabled: bool,
        tier: ConfigTier,
        url: impl Into<String>,
        headers_json: Option<&str>,
    ) -> Self {
        let name = name.into();
        Self {
            transport: TransportSpec::EventStream {
                url: url.into(),
                headers: map_from_stored(headers_json, &name, "headers"),
            },
            name,
            enabled,
            tier,
        }
    }
}

/// Parse a stored JSON array of strings, failing open to an empty list.
fn list_from_stored(raw: Option<&str>, server: &str, field: &str) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str(raw) {
        Ok(list) => list,
        Err(e) => {
            warn!(server = %server, field = %field, error = %e, "Malformed stored JSON, treating as empty");
            Vec::new()
        }
    }
}

/// Parse a stored JSON string map, failing open to an empty map.
fn map_from_stored(raw: Option<&str>, server: &str, field: &str) -> HashMap<String, String> {
    let Some(raw) = raw else {
        return HashMap::new();
    };
    if raw.trim().is_empty() {
        return HashMap::new();
    }
    match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(e) => {
            warn!(server = %server, field = %field, error = %e, "Malformed stored JSON, treating as empty");
            HashMap::new()
        }
    }
}
