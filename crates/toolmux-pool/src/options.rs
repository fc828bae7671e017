//! Runtime options for the connection pool
//!
//! All knobs carry production defaults and deserialize from application
//! configuration. Retry and TTL settings are independent of config
//! fingerprinting: changing them never invalidates cached connections.

use std::time::Duration;

use serde::Deserialize;

/// Bounded retry policy for connection establishment.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Sliding/absolute expiration pair for one cache.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TtlPolicy {
    /// Entry expires this long after its last read.
    pub sliding: Duration,
    /// Entry expires this long after creation, regardless of reads.
    pub absolute: Duration,
}

impl TtlPolicy {
    pub fn new(sliding: Duration, absolute: Duration) -> Self {
        Self { sliding, absolute }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            sliding: Duration::from_secs(30 * 60),
            absolute: Duration::from_secs(2 * 60 * 60),
        }
    }
}

/// Options for the whole pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    pub retry: RetryPolicy,
    /// Timeout for one transport connection attempt.
    pub connect_timeout: Duration,
    /// Expiration for cached long-lived connection sets.
    pub connection_ttl: TtlPolicy,
    /// Expiration for cached status lists (short; independent of
    /// `connection_ttl`).
    pub status_ttl: TtlPolicy,
    /// Wall-clock bound for a single health probe.
    pub probe_timeout: Duration,
    /// How often the background sweeper looks for expired entries.
    pub sweep_interval: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(30),
            connection_ttl: TtlPolicy::default(),
            status_ttl: TtlPolicy::new(Duration::from_secs(15), Duration::from_secs(60)),
            probe_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(60),
        }
    }
}
