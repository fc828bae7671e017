//! Parallel connectivity probing
//!
//! Reports per-server health without touching the long-lived connection
//! cache. Probes run concurrently, each bounded by a short timeout and a
//! cancellation token linked to the caller's; probe clients are closed
//! immediately after listing capabilities. Results are cached briefly under
//! their own key space.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use dashmap::DashMap;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use toolmux_core::{ServerConfig, ServerStatus};

use crate::connector::RetryingConnector;
use crate::options::{PoolOptions, TtlPolicy};
use crate::resolver::ConfigResolver;
use crate::secrets::SecretInjector;

struct StatusEntry {
    records: Arc<Vec<ServerStatus>>,
    created_at: Instant,
    last_access: parking_lot::Mutex<Instant>,
}

impl StatusEntry {
    fn new(records: Arc<Vec<ServerStatus>>) -> Self {
        let now = Instant::now();
        Self {
            records,
            created_at: now,
            last_access: parking_lot::Mutex::new(now),
        }
    }

    fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    fn is_expired(&self, ttl: &TtlPolicy) -> bool {
        self.created_at.elapsed() >= ttl.absolute
            || self.last_access.lock().elapsed() >= ttl.sliding
    }
}

/// Probes every effective server for a user and reports connectivity.
pub struct StatusProber {
    resolver: Arc<ConfigResolver>,
    injector: Arc<SecretInjector>,
    connector: Arc<RetryingConnector>,
    statuses: DashMap<String, StatusEntry>,
    ttl: TtlPolicy,
    probe_timeout: std::time::Duration,
}

impl StatusProber {
    pub fn new(
        resolver: Arc<ConfigResolver>,
        injector: Arc<SecretInjector>,
        connector: Arc<RetryingConnector>,
        options: &PoolOptions,
    ) -> Self {
        Self {
            resolver,
            injector,
            connector,
            statuses: DashMap::new(),
            ttl: options.status_ttl,
            probe_timeout: options.probe_timeout,
        }
    }

    /// Probe all effective servers for `user_id`, or return a fresh cached
    /// status list.
    ///
    /// Probes run in parallel; the overall wait is bounded by the longest
    /// single probe, not their sum. Probe failures never propagate — they
    /// become per-server `error` messages. Only a config-store failure
    /// propagates.
    pub async fn get_statuses(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<Vec<ServerStatus>>> {
        if let Some(entry) = self.statuses.get(user_id) {
            if !entry.is_expired(&self.ttl) {
                entry.touch();
                debug!(user_id = %user_id, "Returning cached server statuses");
                return Ok(Arc::clone(&entry.records));
            }
        }

        let configs = self.resolver.resolve(user_id).await?;

        let probes = configs
            .iter()
            .map(|config| self.probe(user_id, config, cancel));
        let mut records = join_all(probes).await;

        records.sort_by(|a, b| {
            Reverse(a.source)
                .cmp(&Reverse(b.source))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        let records = Arc::new(records);
        self.statuses
            .insert(user_id.to_string(), StatusEntry::new(Arc::clone(&records)));

        debug!(
            user_id = %user_id,
            count = records.len(),
            connected = records.iter().filter(|r| r.connected).count(),
            "Probed server statuses"
        );

        Ok(records)
    }

    /// Drop the cached status list for a user, if any.
    pub fn invalidate(&self, user_id: &str) {
        self.statuses.remove(user_id);
    }

    /// Probe one server: short-lived connect, list capabilities, close.
    async fn probe(
        &self,
        user_id: &str,
        config: &ServerConfig,
        cancel: &CancellationToken,
    ) -> ServerStatus {
        let child = cancel.child_token();

        let attempt = async {
            let transport = self
                .injector
                .resolve_transport(&config.transport, user_id)
                .await?;
            let client = self.connector.connect(&config.name, &transport, &child).await?;

            // Probe clients never outlive the probe: close regardless of
            // whether the listing succeeded.
            let listed = client.list_capabilities().await;
            if let Err(e) = client.close().await {
                warn!(server = %config.name, error = %e, "Failed to close probe client");
            }
            listed.map(|_| ())
        };

        let outcome = tokio::select! {
            result = tokio::time::timeout(self.probe_timeout, attempt) => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(format!("{:#}", e)),
                Err(_) => Err(format!("Probe timed out after {:?}", self.probe_timeout)),
            },
            _ = child.cancelled() => Err("Probe cancelled".to_string()),
        };

        match outcome {
            Ok(()) => ServerStatus::connected(
                &config.name,
                config.tier,
                config.transport.transport_type(),
                config.transport.endpoint(),
            ),
            Err(message) => ServerStatus::failed(
                &config.name,
                config.tier,
                config.transport.transport_type(),
                config.transport.endpoint(),
                message,
            ),
        }
    }
}
