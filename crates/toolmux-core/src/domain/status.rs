use serde::Serialize;

use super::{ConfigTier, TransportType};

/// Connectivity report for one effective server configuration.
///
/// Recomputed per probe cycle and cached briefly, independently of the
/// long-lived connection cache.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub name: String,
    /// Which precedence tier the effective config came from.
    pub source: ConfigTier,
    pub transport: TransportType,
    /// Command path for stdio servers, URL for event-stream servers.
    pub endpoint: String,
    pub connected: bool,
    /// Failure message when `connected` is false.
    pub error: Option<String>,
}

impl ServerStatus {
    pub fn connected(
        name: impl Into<String>,
        source: ConfigTier,
        transport: TransportType,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            transport,
            endpoint: endpoint.into(),
            connected: true,
            error: None,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        source: ConfigTier,
        transport: TransportType,
        endpoint: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            transport,
            endpoint: endpoint.into(),
            connected: false,
            error: Some(error.into()),
        }
    }
}
