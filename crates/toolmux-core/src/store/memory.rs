//! In-memory store implementations
//!
//! `StaticConfigStore` backs deployments whose tier data comes from startup
//! configuration rather than a database, and doubles as the test fixture.
//! `InMemorySecretStore` holds already-protected blobs; it never sees
//! plaintext.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{ConfigStore, SecretStore, StoreResult};
use crate::domain::ServerConfig;

/// Static, in-memory [`ConfigStore`].
#[derive(Default)]
pub struct StaticConfigStore {
    global: Vec<ServerConfig>,
    roles: HashMap<String, Vec<ServerConfig>>,
    users: HashMap<String, Vec<ServerConfig>>,
    user_roles: HashMap<String, String>,
}

impl StaticConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global(mut self, config: ServerConfig) -> Self {
        self.global.push(config);
        self
    }

    pub fn with_role_server(mut self, role: impl Into<String>, config: ServerConfig) -> Self {
        self.roles.entry(role.into()).or_default().push(config);
        self
    }

    pub fn with_user_server(mut self, user_id: impl Into<String>, config: ServerConfig) -> Self {
        self.users.entry(user_id.into()).or_default().push(config);
        self
    }

    pub fn with_user_role(mut self, user_id: impl Into<String>, role: impl Into<String>) -> Self {
        self.user_roles.insert(user_id.into(), role.into());
        self
    }
}

#[async_trait]
impl ConfigStore for StaticConfigStore {
    async fn global_servers(&self) -> StoreResult<Vec<ServerConfig>> {
        Ok(self.global.clone())
    }

    async fn role_servers(&self, role: &str) -> StoreResult<Vec<ServerConfig>> {
        Ok(self.roles.get(role).cloned().unwrap_or_default())
    }

    async fn user_servers(&self, user_id: &str) -> StoreResult<Vec<ServerConfig>> {
        Ok(self.users.get(user_id).cloned().unwrap_or_default())
    }

    async fn user_role(&self, user_id: &str) -> StoreResult<Option<String>> {
        Ok(self.user_roles.get(user_id).cloned())
    }
}

/// In-memory [`SecretStore`] of protected blobs keyed by `(user, input)`.
#[derive(Default)]
pub struct InMemorySecretStore {
    entries: RwLock<HashMap<(String, String), String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a protected blob for `(user_id, input_id)`, replacing any
    /// previous value.
    pub fn insert(
        &self,
        user_id: impl Into<String>,
        input_id: impl Into<String>,
        protected: impl Into<String>,
    ) {
        self.entries
            .write()
            .unwrap()
            .insert((user_id.into(), input_id.into()), protected.into());
    }

    pub fn remove(&self, user_id: &str, input_id: &str) {
        self.entries
            .write()
            .unwrap()
            .remove(&(user_id.to_string(), input_id.to_string()));
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_protected(&self, user_id: &str, input_id: &str) -> StoreResult<Option<String>> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .get(&(user_id.to_string(), input_id.to_string()))
            .cloned())
    }
}
