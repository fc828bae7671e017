//! Bounded retry connection establishment
//!
//! One `connect` call makes up to `max_retries + 1` attempts with a fixed
//! delay between them. The cancellation token aborts the inter-attempt
//! delay; an attempt already in flight always runs to completion. After
//! exhaustion the last factory error is returned verbatim so callers see
//! the real failure, not a retry wrapper.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::options::RetryPolicy;
use crate::transport::{ClientFactory, ResolvedTransport, ToolClient};

/// Establishes one live connection to one resolved server config.
pub struct RetryingConnector {
    factory: Arc<dyn ClientFactory>,
    policy: RetryPolicy,
}

impl RetryingConnector {
    pub fn new(factory: Arc<dyn ClientFactory>, policy: RetryPolicy) -> Self {
        Self { factory, policy }
    }

    /// Connect to `server_name` with bounded retries.
    pub async fn connect(
        &self,
        server_name: &str,
        transport: &ResolvedTransport,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ToolClient>> {
        let max_attempts = self.policy.max_retries.saturating_add(1);
        let mut attempt = 1u32;

        loop {
            match self.factory.create(server_name, transport).await {
                Ok(client) => {
                    if attempt > 1 {
                        info!(server = %server_name, attempt, "Connected after retry");
                    }
                    return Ok(client);
                }
                Err(e) => {
                    warn!(
                        server = %server_name,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Connection attempt failed"
                    );

                    if attempt >= max_attempts {
                        return Err(e);
                    }

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!(server = %server_name, "Retry delay cancelled");
                            return Err(e);
                        }
                        _ = tokio::time::sleep(self.policy.retry_delay) => {}
                    }

                    attempt += 1;
                }
            }
        }
    }
}
