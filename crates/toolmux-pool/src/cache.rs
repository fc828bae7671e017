//! Per-user connection cache
//!
//! Owns the live connection set for each user. Creation is single-flighted
//! under a lazily created per-user mutex; reads are lock-free. Entries
//! expire on a sliding TTL with an absolute ceiling, and eviction hands the
//! connection list to a background disposal task — the evicting call never
//! waits on connection teardown.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolmux_core::ToolPlugin;

use crate::connector::RetryingConnector;
use crate::options::TtlPolicy;
use crate::resolver::ConfigResolver;
use crate::secrets::SecretInjector;
use crate::transport::ToolClient;

/// One live, cached connection to a tool server.
///
/// Owned by exactly one cache entry until eviction, at which point ownership
/// passes to the disposal task. `ToolClient::close` is take-once, so the
/// connection is torn down exactly once even if disposal paths race.
pub struct CachedConnection {
    pub server_name: String,
    pub client: Box<dyn ToolClient>,
    pub plugin: ToolPlugin,
}

struct CacheEntry {
    connections: Arc<Vec<CachedConnection>>,
    created_at: Instant,
    last_access: parking_lot::Mutex<Instant>,
}

impl CacheEntry {
    fn new(connections: Arc<Vec<CachedConnection>>) -> Self {
        let now = Instant::now();
        Self {
            connections,
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

/// Per-user cache of live tool-server connections.
pub struct ConnectionCache {
    resolver: Arc<ConfigResolver>,
    injector: Arc<SecretInjector>,
    connector: Arc<RetryingConnector>,
    entries: DashMap<String, CacheEntry>,
    /// Per-user build locks, created lazily and never removed. Growth is
    /// bounded by the number of distinct users seen by this process; flagged
    /// as an operational concern for deployments with unbounded key spaces.
    locks: DashMap<String, Arc<Mutex<()>>>,
    ttl: TtlPolicy,
}

impl ConnectionCache {
    pub fn new(
        resolver: Arc<ConfigResolver>,
        injector: Arc<SecretInjector>,
        connector: Arc<RetryingConnector>,
        ttl: TtlPolicy,
    ) -> Self {
        Self {
            resolver,
            injector,
            connector,
            entries: DashMap::new(),
            locks: DashMap::new(),
            ttl,
        }
    }

    /// Return the user's live connection set, building it if absent.
    ///
    /// At most one build runs per user; concurrent callers block on the
    /// per-user mutex and observe the one completed result. A single
    /// server's connection failure is logged and that server skipped —
    /// sibling servers still populate the cache.
    pub async fn ensure_connections(
        &self,
        user_id: &str,
    ) -> Result<Arc<Vec<CachedConnection>>> {
        // Fast path: live entry, no locking.
        if let Some(entry) = self.entries.get(user_id) {
            if !entry.is_expired(&self.ttl) {
                entry.touch();
                return Ok(Arc::clone(&entry.connections));
            }
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        // Double-check: another caller may have finished the build while we
        // waited on the mutex.
        if let Some(entry) = self.entries.get(user_id) {
            if !entry.is_expired(&self.ttl) {
                entry.touch();
                return Ok(Arc::clone(&entry.connections));
            }
        }

        // A stale entry still present is evicted before rebuilding.
        self.evict(user_id, "expired");

        let connections = Arc::new(self.build_connections(user_id).await?);
        self.entries
            .insert(user_id.to_string(), CacheEntry::new(Arc::clone(&connections)));

        info!(
            user_id = %user_id,
            count = connections.len(),
            "Cached tool server connections"
        );

        Ok(connections)
    }

    /// Explicitly remove a user's cached connections.
    ///
    /// Idempotent; triggers the same asynchronous disposal path as TTL
    /// eviction and returns without waiting for it.
    pub fn disconnect_user(&self, user_id: &str) {
        self.evict(user_id, "disconnect");
    }

    /// Evict every expired entry. Returns how many were evicted.
    pub fn sweep_expired(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_expired(&self.ttl))
            .map(|entry| entry.key().clone())
            .collect();

        for user_id in &expired {
            self.evict(user_id, "ttl");
        }

        expired.len()
    }

    /// Run `sweep_expired` on a fixed interval until the task is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = cache.sweep_expired();
                if evicted > 0 {
                    debug!(evicted, "Sweeper evicted expired connection sets");
                }
            }
        })
    }

    /// Users with a currently cached (possibly expired) connection set.
    pub fn cached_users(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Total live connections across all users.
    pub fn connected_count(&self) -> usize {
        self.entries.iter().map(|e| e.value().connections.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get-or-create the per-user build lock.
    ///
    /// The registry lock is held only for the map operation itself, never
    /// across connection I/O.
    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Connect every effective server for `user_id`, skipping failures.
    async fn build_connections(&self, user_id: &str) -> Result<Vec<CachedConnection>> {
        let configs = self.resolver.resolve(user_id).await?;
        let cancel = CancellationToken::new();
        let mut connections = Vec::with_capacity(configs.len());

        for config in configs {
            let transport = self
                .injector
                .resolve_transport(&config.transport, user_id)
                .await?;

            match self.connector.connect(&config.name, &transport, &cancel).await {
                Ok(client) => {
                    let plugin = match client.list_capabilities().await {
                        Ok(capabilities) => ToolPlugin::new(&config.name, capabilities),
                        Err(e) => {
                            warn!(
                                user_id = %user_id,
                                server = %config.name,
                                error = %e,
                                "Capability listing failed, attaching empty plugin"
                            );
                            ToolPlugin::empty(&config.name)
                        }
                    };
                    connections.push(CachedConnection {
                        server_name: config.name,
                        client,
                        plugin,
                    });
                }
                Err(e) => {
                    // One server's failure never fails the batch.
                    warn!(
                        user_id = %user_id,
                        server = %config.name,
                        error = %e,
                        "Skipping server, connection failed"
                    );
                }
            }
        }

        Ok(connections)
    }

    fn evict(&self, user_id: &str, reason: &'static str) {
        if let Some((_, entry)) = self.entries.remove(user_id) {
            info!(
                user_id = %user_id,
                reason,
                count = entry.connections.len(),
                "Evicting cached connections"
            );
            dispose(entry.connections);
        }
    }
}

/// Schedule best-effort disposal of an evicted connection list.
///
/// Runs on the background executor; errors are logged and swallowed. The
/// caller that triggered eviction has already returned by the time close
/// routines run.
fn dispose(connections: Arc<Vec<CachedConnection>>) {
    if connections.is_empty() {
        return;
    }
    tokio::spawn(async move {
        for connection in connections.iter() {
            if let Err(e) = connection.client.close().await {
                warn!(
                    server = %connection.server_name,
                    error = %e,
                    "Failed to close evicted connection"
                );
            }
        }
        debug!(count = connections.len(), "Disposed evicted connections");
    });
}
