//! Store traits for the connection manager's collaborators
//!
//! These traits define the interfaces this core consumes without specifying
//! the implementation (database, static file, in-memory, etc.)

mod memory;

pub use memory::{InMemorySecretStore, StaticConfigStore};

use async_trait::async_trait;

use crate::domain::{ServerConfig, ToolPlugin};

/// Result type for store operations
pub type StoreResult<T> = anyhow::Result<T>;

/// Read-only source of tiered server configurations.
///
/// A failure here has no meaningful partial result and is allowed to
/// propagate to the caller, unlike per-server connection failures.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Deployment-wide server definitions.
    async fn global_servers(&self) -> StoreResult<Vec<ServerConfig>>;

    /// Default server definitions for one user role.
    async fn role_servers(&self, role: &str) -> StoreResult<Vec<ServerConfig>>;

    /// Per-individual server overrides.
    async fn user_servers(&self, user_id: &str) -> StoreResult<Vec<ServerConfig>>;

    /// The role assigned to a user, if any.
    async fn user_role(&self, user_id: &str) -> StoreResult<Option<String>>;
}

/// Per-user protected secret values, keyed by input id.
///
/// Values are stored protected at rest; decryption happens on demand in the
/// secret injector, never here.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get the protected blob for `(user_id, input_id)`, if one is stored.
    async fn get_protected(&self, user_id: &str, input_id: &str) -> StoreResult<Option<String>>;
}

/// Receiver for per-user tool plugins.
///
/// The connection manager offers a name-deduplicated plugin set per user;
/// the host is responsible for not double-attaching a plugin whose name it
/// already holds.
pub trait PluginHost: Send + Sync {
    /// Attach `plugin` for `user_id` unless one with the same name is
    /// already attached. Returns whether the plugin was attached.
    fn attach_if_absent(&self, user_id: &str, plugin: ToolPlugin) -> bool;
}
