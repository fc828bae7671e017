//! StatusProber behavior through the composed service
//!
//! Covers probe results and ordering, the independent status cache, probe
//! timeouts, and isolation from the long-lived connection cache.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tests::harness::{stdio_config, PoolHarness};
use tokio_util::sync::CancellationToken;
use toolmux_core::{ConfigTier, StaticConfigStore};
use toolmux_pool::{PoolOptions, TtlPolicy};

fn mixed_store(user_id: &str) -> StaticConfigStore {
    StaticConfigStore::new()
        .with_global(stdio_config("healthy", ConfigTier::Global, "cmd-ok"))
        .with_user_server(user_id, stdio_config("broken", ConfigTier::User, "cmd-bad"))
}

#[tokio::test]
async fn test_statuses_report_per_server_connectivity() {
    let harness = PoolHarness::new(mixed_store("alice"));
    harness.factory.fail_server("broken");

    let statuses = harness
        .service
        .get_statuses("alice", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(statuses.len(), 2);

    // Ordered by source tier (User first), then name.
    assert_eq!(statuses[0].name, "broken");
    assert_eq!(statuses[0].source, ConfigTier::User);
    assert!(!statuses[0].connected);
    assert!(statuses[0]
        .error
        .as_deref()
        .unwrap()
        .contains("connection refused"));

    assert_eq!(statuses[1].name, "healthy");
    assert_eq!(statuses[1].source, ConfigTier::Global);
    assert!(statuses[1].connected);
    assert!(statuses[1].error.is_none());
}

#[tokio::test]
async fn test_probe_clients_are_closed_immediately() {
    let harness = PoolHarness::new(mixed_store("alice"));

    harness
        .service
        .get_statuses("alice", &CancellationToken::new())
        .await
        .unwrap();

    // Every client the probe created has already been closed.
    let clients = harness.factory.clients();
    assert_eq!(clients.len(), 2);
    for client in clients {
        assert_eq!(client.close_count(), 1);
    }
}

#[tokio::test]
async fn test_status_list_is_cached_briefly() {
    let harness = PoolHarness::new(mixed_store("alice"));
    let cancel = CancellationToken::new();

    let first = harness.service.get_statuses("alice", &cancel).await.unwrap();
    let second = harness.service.get_statuses("alice", &cancel).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(harness.factory.calls_for("healthy"), 1);
}

#[tokio::test]
async fn test_status_cache_expires_independently() {
    let mut options = PoolOptions::default();
    options.status_ttl = TtlPolicy::new(Duration::from_millis(30), Duration::from_millis(100));
    let harness = PoolHarness::with_options(mixed_store("alice"), options);
    let cancel = CancellationToken::new();

    harness.service.get_statuses("alice", &cancel).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    harness.service.get_statuses("alice", &cancel).await.unwrap();

    assert_eq!(harness.factory.calls_for("healthy"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_probe_timeout_reports_failure() {
    let mut options = PoolOptions::default();
    options.probe_timeout = Duration::from_millis(40);
    options.retry.max_retries = 0;
    let store = StaticConfigStore::new()
        .with_global(stdio_config("slow", ConfigTier::Global, "cmd-slow"));
    let harness = PoolHarness::with_options(store, options);
    harness.factory.set_connect_delay(Duration::from_millis(500));

    let statuses = harness
        .service
        .get_statuses("alice", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(statuses.len(), 1);
    assert!(!statuses[0].connected);
    assert!(statuses[0].error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_probing_never_mutates_connection_cache() {
    let harness = PoolHarness::new(mixed_store("alice"));

    let cached = harness.service.ensure_connections("alice").await.unwrap();
    let cache_builds = harness.factory.total_calls();

    harness
        .service
        .get_statuses("alice", &CancellationToken::new())
        .await
        .unwrap();

    // The long-lived entry is untouched: same Arc, no re-dial for the cache,
    // and none of its clients were closed by the probe pass.
    let again = harness.service.ensure_connections("alice").await.unwrap();
    assert!(Arc::ptr_eq(&cached, &again));
    let probe_creates = harness.factory.total_calls() - cache_builds;
    assert_eq!(probe_creates, 2);

    let clients = harness.factory.clients();
    // First two clients belong to the cache and stay open; the probe pair
    // is closed.
    assert_eq!(clients[0].close_count(), 0);
    assert_eq!(clients[1].close_count(), 0);
    assert_eq!(clients[2].close_count(), 1);
    assert_eq!(clients[3].close_count(), 1);
}

#[tokio::test]
async fn test_cancellation_fails_probes_without_error() {
    let harness = PoolHarness::new(mixed_store("alice"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let statuses = harness.service.get_statuses("alice", &cancel).await.unwrap();

    // Cancellation surfaces per-server, never as a thrown error.
    assert_eq!(statuses.len(), 2);
}
