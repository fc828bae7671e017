//! Secret templating for connection parameters
//!
//! Rewrites `${input:<id>}` placeholders using per-user protected secrets.
//! A missing entry or a failed decryption substitutes the empty string; the
//! connection attempt itself decides whether that matters. Placeholder
//! resolution applies to argument, environment, and header values only —
//! never to a server's name, command path, or URL.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use toolmux_core::{SecretStore, TransportSpec};

use crate::crypto::SecretCipher;
use crate::transport::ResolvedTransport;

/// Opening marker of a secret placeholder token.
const TOKEN_OPEN: &str = "${input:";

/// Fills secret placeholders from a protected per-user store.
pub struct SecretInjector {
    store: Arc<dyn SecretStore>,
    cipher: Arc<SecretCipher>,
}

impl SecretInjector {
    pub fn new(store: Arc<dyn SecretStore>, cipher: Arc<SecretCipher>) -> Self {
        Self { store, cipher }
    }

    /// Replace every `${input:<id>}` token in `raw` with the user's secret.
    ///
    /// An opening marker with no closing brace is copied through as literal
    /// text. Only a secret-store read failure propagates; absent or
    /// undecryptable secrets become empty strings.
    pub async fn inject(&self, raw: &str, user_id: &str) -> Result<String> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(start) = rest.find(TOKEN_OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + TOKEN_OPEN.len()..];
            match after.find('}') {
                Some(end) => {
                    out.push_str(&self.lookup(user_id, &after[..end]).await?);
                    rest = &after[end + 1..];
                }
                None => {
                    // Unterminated token: keep the trailing text as-is.
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Resolve a transport template into connection-ready parameters.
    pub async fn resolve_transport(
        &self,
        transport: &TransportSpec,
        user_id: &str,
    ) -> Result<ResolvedTransport> {
        match transport {
            TransportSpec::Stdio { command, args, env } => {
                let mut resolved_args = Vec::with_capacity(args.len());
                for arg in args {
                    resolved_args.push(self.inject(arg, user_id).await?);
                }
                let mut resolved_env = HashMap::with_capacity(env.len());
                for (key, value) in env {
                    resolved_env.insert(key.clone(), self.inject(value, user_id).await?);
                }
                Ok(ResolvedTransport::Stdio {
                    command: command.clone(),
                    args: resolved_args,
                    env: resolved_env,
                })
            }
            TransportSpec::EventStream { url, headers } => {
                let mut resolved_headers = HashMap::with_capacity(headers.len());
                for (key, value) in headers {
                    resolved_headers.insert(key.clone(), self.inject(value, user_id).await?);
                }
                Ok(ResolvedTransport::EventStream {
                    url: url.clone(),
                    headers: resolved_headers,
                })
            }
        }
    }

    async fn lookup(&self, user_id: &str, input_id: &str) -> Result<String> {
        let Some(protected) = self.store.get_protected(user_id, input_id).await? else {
            debug!(
                user_id = %user_id,
                input_id = %input_id,
                "No stored secret, substituting empty string"
            );
            return Ok(String::new());
        };

        match self.cipher.unprotect_or_none(&protected) {
            Some(value) => Ok(value),
            None => {
                warn!(
                    user_id = %user_id,
                    input_id = %input_id,
                    "Failed to unprotect stored secret, substituting empty string"
                );
                Ok(String::new())
            }
        }
    }
}
