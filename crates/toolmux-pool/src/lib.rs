//! # Toolmux Pool Library
//!
//! Per-user, multi-tenant tool-server connection management:
//!
//! - `resolver` - merges three configuration tiers into a deduplicated
//!   effective set per user
//! - `secrets` - fills `${input:<id>}` placeholders from protected per-user
//!   secrets
//! - `connector` - bounded retry-with-backoff connection establishment
//! - `cache` - single-flighted per-user connection cache with TTL eviction
//!   and non-blocking disposal
//! - `prober` - parallel, time-bounded connectivity probing
//! - `service` - the composed entry point sessions talk to

pub mod cache;
pub mod connector;
pub mod crypto;
pub mod options;
pub mod prober;
pub mod resolver;
pub mod secrets;
pub mod service;
pub mod transport;

pub use cache::{CachedConnection, ConnectionCache};
pub use connector::RetryingConnector;
pub use crypto::{generate_master_key, SecretCipher};
pub use options::{PoolOptions, RetryPolicy, TtlPolicy};
pub use prober::StatusProber;
pub use resolver::ConfigResolver;
pub use secrets::SecretInjector;
pub use service::ToolConnectionService;
pub use transport::{ClientFactory, McpClientFactory, ResolvedTransport, ToolClient};
