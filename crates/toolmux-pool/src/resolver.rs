//! Three-tier configuration resolution
//!
//! Merges Global, Role, and User server definitions into one deduplicated,
//! deterministically ordered effective set per user. Pure over config-store
//! snapshots: no side effects, safe to call concurrently and repeatedly.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use ring::digest::{Context, SHA256};
use tracing::{debug, info};

use toolmux_core::{ConfigStore, ServerConfig, TransportSpec};

/// Resolves the effective server set for one user.
pub struct ConfigResolver {
    store: Arc<dyn ConfigStore>,
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Resolve the deduplicated, ordered effective config set for `user_id`.
    ///
    /// Precedence: User > Role > Global, by case-insensitive name. Disabled
    /// entries never reach the result. Differently named but content-identical
    /// entries collapse to the first occurrence in the sorted order (higher
    /// tier, then lexicographically first name).
    ///
    /// A config-store failure propagates: there is no meaningful partial
    /// result for a user whose entitlements cannot be read.
    pub async fn resolve(&self, user_id: &str) -> Result<Vec<ServerConfig>> {
        let global = self.store.global_servers().await?;
        let role = match self.store.user_role(user_id).await? {
            Some(role) => self.store.role_servers(&role).await?,
            None => Vec::new(),
        };
        let user = self.store.user_servers(user_id).await?;

        // Explicit reduction over tiers in fixed order; a later tier always
        // overwrites an earlier one on name collision, which encodes the
        // precedence rule in the fold itself.
        let mut by_name: HashMap<String, ServerConfig> = HashMap::new();
        for config in global.into_iter().chain(role).chain(user) {
            by_name.insert(config.name.to_lowercase(), config);
        }

        let mut effective: Vec<ServerConfig> =
            by_name.into_values().filter(|c| c.enabled).collect();

        effective.sort_by(|a, b| {
            b.tier
                .cmp(&a.tier)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        // Collapse differently named but identical definitions; the first
        // occurrence in sort order survives.
        let mut seen = HashSet::new();
        let mut result = Vec::with_capacity(effective.len());
        for config in effective {
            if seen.insert(fingerprint(&config)) {
                result.push(config);
            } else {
                info!(
                    user_id = %user_id,
                    server = %config.name,
                    "Skipping server config with duplicate fingerprint"
                );
            }
        }

        debug!(
            user_id = %user_id,
            count = result.len(),
            "Resolved effective server configs"
        );

        Ok(result)
    }
}

/// Canonical content fingerprint of a server config.
///
/// Hashes the semantically relevant fields only: kind, endpoint, args, env,
/// headers. Maps serialize with sorted keys so insertion order never changes
/// the hash; `name`, `enabled`, and `tier` are excluded so differently named
/// duplicates collapse. Secret placeholders are hashed as written, never
/// their resolved values.
pub fn fingerprint(config: &ServerConfig) -> String {
    let empty = HashMap::new();
    let (kind, endpoint, args, env, headers): (
        &str,
        &str,
        &[String],
        &HashMap<String, String>,
        &HashMap<String, String>,
    ) = match &config.transport {
        TransportSpec::Stdio { command, args, env } => ("stdio", command, args, env, &empty),
        TransportSpec::EventStream { url, headers } => ("event_stream", url, &[], &empty, headers),
    };

    let mut ctx = Context::new(&SHA256);
    ctx.update(kind.as_bytes());
    ctx.update(b"|");
    ctx.update(endpoint.as_bytes());
    ctx.update(b"|");
    ctx.update(canonical_list(args).as_bytes());
    ctx.update(b"|");
    ctx.update(canonical_map(env).as_bytes());
    ctx.update(b"|");
    ctx.update(canonical_map(headers).as_bytes());

    hex::encode(ctx.finish().as_ref())
}

fn canonical_list(list: &[String]) -> String {
    serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

fn canonical_map(map: &HashMap<String, String>) -> String {
    let sorted: BTreeMap<&str, &str> = map.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    serde_json::to_string(&sorted).unwrap_or_else(|_| "{}".to_string())
}
