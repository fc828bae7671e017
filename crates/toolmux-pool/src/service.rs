//! Composed connection service
//!
//! Wires the resolver, injector, connector, cache, and prober into the one
//! object session plumbing talks to. A session/circuit close notification
//! calls `disconnect_user`, the sole externally triggered teardown path
//! besides TTL eviction.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use toolmux_core::{ConfigStore, PluginHost, SecretStore, ServerStatus};

use crate::cache::{CachedConnection, ConnectionCache};
use crate::connector::RetryingConnector;
use crate::crypto::SecretCipher;
use crate::options::PoolOptions;
use crate::prober::StatusProber;
use crate::resolver::ConfigResolver;
use crate::secrets::SecretInjector;
use crate::transport::{ClientFactory, McpClientFactory};

/// Entry point for per-user tool-server connection management.
pub struct ToolConnectionService {
    cache: Arc<ConnectionCache>,
    prober: Arc<StatusProber>,
    sweep_interval: Duration,
}

impl ToolConnectionService {
    /// Build the service over the production MCP transport factory.
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        secret_store: Arc<dyn SecretStore>,
        cipher: Arc<SecretCipher>,
        options: PoolOptions,
    ) -> Self {
        let factory = Arc::new(McpClientFactory::new(options.connect_timeout));
        Self::with_factory(config_store, secret_store, cipher, factory, options)
    }

    /// Build the service over a caller-provided client factory.
    pub fn with_factory(
        config_store: Arc<dyn ConfigStore>,
        secret_store: Arc<dyn SecretStore>,
        cipher: Arc<SecretCipher>,
        factory: Arc<dyn ClientFactory>,
        options: PoolOptions,
    ) -> Self {
        let resolver = Arc::new(ConfigResolver::new(config_store));
        let injector = Arc::new(SecretInjector::new(secret_store, cipher));
        let connector = Arc::new(RetryingConnector::new(factory, options.retry));

        let cache = Arc::new(ConnectionCache::new(
            Arc::clone(&resolver),
            Arc::clone(&injector),
            Arc::clone(&connector),
            options.connection_ttl,
        ));
        let prober = Arc::new(StatusProber::new(resolver, injector, connector, &options));

        Self {
            cache,
            prober,
            sweep_interval: options.sweep_interval,
        }
    }

    /// Ensure live connections exist for `user_id` and return them.
    pub async fn ensure_connections(
        &self,
        user_id: &str,
    ) -> Result<Arc<Vec<CachedConnection>>> {
        self.cache.ensure_connections(user_id).await
    }

    /// Offer every cached plugin for `user_id` to `host`.
    ///
    /// Returns how many plugins the host actually attached; the host skips
    /// names it already holds.
    pub async fn attach_plugins(&self, host: &dyn PluginHost, user_id: &str) -> Result<usize> {
        let connections = self.ensure_connections(user_id).await?;
        let attached = connections
            .iter()
            .filter(|c| host.attach_if_absent(user_id, c.plugin.clone()))
            .count();

        debug!(
            user_id = %user_id,
            offered = connections.len(),
            attached,
            "Offered tool plugins to host"
        );

        Ok(attached)
    }

    /// Report connectivity for every effective server of `user_id`.
    pub async fn get_statuses(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<Vec<ServerStatus>>> {
        self.prober.get_statuses(user_id, cancel).await
    }

    /// Tear down a user's cached state (session/circuit close).
    ///
    /// Removes both the connection entry and the status entry; connection
    /// disposal happens asynchronously. Idempotent.
    pub fn disconnect_user(&self, user_id: &str) {
        self.cache.disconnect_user(user_id);
        self.prober.invalidate(user_id);
    }

    /// Start the background TTL sweeper for the connection cache.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.cache.spawn_sweeper(self.sweep_interval)
    }

    /// The underlying connection cache, for introspection.
    pub fn cache(&self) -> &Arc<ConnectionCache> {
        &self.cache
    }
}
