//! ConnectionCache behavior through the composed service
//!
//! Covers single-flight builds, the lock-free fast path, partial failure,
//! TTL eviction, and exactly-once asynchronous disposal.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tests::harness::{stdio_config, PoolHarness};
use toolmux_core::{ConfigTier, StaticConfigStore};
use toolmux_pool::{PoolOptions, TtlPolicy};

fn two_server_store(user_id: &str) -> StaticConfigStore {
    StaticConfigStore::new()
        .with_global(stdio_config("alpha", ConfigTier::Global, "cmd-alpha"))
        .with_user_server(user_id, stdio_config("beta", ConfigTier::User, "cmd-beta"))
}

/// Poll until every handed-out client reports the expected close count.
async fn wait_for_close_counts(harness: &PoolHarness, expected: u32) {
    for _ in 0..100 {
        if harness
            .factory
            .clients()
            .iter()
            .all(|c| c.close_count() == expected)
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("clients never reached close count {}", expected);
}

#[tokio::test]
async fn test_ensure_connections_builds_all_effective_servers() {
    let harness = PoolHarness::new(two_server_store("alice"));

    let connections = harness.service.ensure_connections("alice").await.unwrap();

    let names: Vec<&str> = connections.iter().map(|c| c.server_name.as_str()).collect();
    // Resolver order: descending tier, then name.
    assert_eq!(names, vec!["beta", "alpha"]);
}

#[tokio::test]
async fn test_second_call_hits_fast_path() {
    let harness = PoolHarness::new(two_server_store("alice"));

    let first = harness.service.ensure_connections("alice").await.unwrap();
    let second = harness.service.ensure_connections("alice").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(harness.factory.calls_for("alpha"), 1);
    assert_eq!(harness.factory.calls_for("beta"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_single_flight() {
    let harness = Arc::new(PoolHarness::new(two_server_store("alice")));
    harness.factory.set_connect_delay(Duration::from_millis(50));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let harness = Arc::clone(&harness);
            tokio::spawn(async move { harness.service.ensure_connections("alice").await.unwrap() })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;

    // Exactly one underlying connect sequence per distinct server.
    assert_eq!(harness.factory.calls_for("alpha"), 1);
    assert_eq!(harness.factory.calls_for("beta"), 1);

    // All callers observe the same completed list, never a partial one.
    let first = results[0].as_ref().unwrap();
    for result in &results {
        let list = result.as_ref().unwrap();
        assert_eq!(list.len(), 2);
        assert!(Arc::ptr_eq(first, list));
    }
}

#[tokio::test]
async fn test_users_are_cached_independently() {
    let store = StaticConfigStore::new()
        .with_global(stdio_config("shared", ConfigTier::Global, "cmd"));
    let harness = PoolHarness::new(store);

    harness.service.ensure_connections("alice").await.unwrap();
    harness.service.ensure_connections("bob").await.unwrap();

    // One connection per user key, not one shared between them.
    assert_eq!(harness.factory.calls_for("shared"), 2);
    assert_eq!(harness.service.cache().len(), 2);
}

#[tokio::test]
async fn test_partial_failure_keeps_siblings() {
    let harness = PoolHarness::new(two_server_store("alice"));
    harness.factory.fail_server("alpha");

    let connections = harness.service.ensure_connections("alice").await.unwrap();

    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].server_name, "beta");
}

#[tokio::test]
async fn test_all_servers_failing_yields_empty_list() {
    let harness = PoolHarness::new(two_server_store("alice"));
    harness.factory.fail_server("alpha");
    harness.factory.fail_server("beta");

    let connections = harness.service.ensure_connections("alice").await.unwrap();
    assert!(connections.is_empty());
}

#[tokio::test]
async fn test_disconnect_user_disposes_exactly_once() {
    let harness = PoolHarness::new(two_server_store("alice"));

    harness.service.ensure_connections("alice").await.unwrap();
    assert_eq!(harness.factory.clients().len(), 2);

    // The disconnect call itself is synchronous and non-blocking; disposal
    // catches up in the background.
    harness.service.disconnect_user("alice");
    assert!(harness.service.cache().is_empty());

    wait_for_close_counts(&harness, 1).await;

    // Idempotent: a second disconnect neither panics nor re-closes.
    harness.service.disconnect_user("alice");
    tokio::time::sleep(Duration::from_millis(50)).await;
    for client in harness.factory.clients() {
        assert_eq!(client.close_count(), 1);
    }
}

#[tokio::test]
async fn test_sliding_ttl_expiry_rebuilds_and_disposes() {
    let mut options = PoolOptions::default();
    options.retry.retry_delay = Duration::from_millis(1);
    options.connection_ttl = TtlPolicy::new(Duration::from_millis(40), Duration::from_secs(60));
    let harness = PoolHarness::with_options(two_server_store("alice"), options);

    let first = harness.service.ensure_connections("alice").await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    let second = harness.service.ensure_connections("alice").await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(harness.factory.calls_for("alpha"), 2);

    // The first generation's clients get closed by the eviction path.
    for _ in 0..100 {
        let closed = harness
            .factory
            .clients()
            .iter()
            .filter(|c| c.close_count() == 1)
            .count();
        if closed == 2 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("evicted clients were never disposed");
}

#[tokio::test]
async fn test_sweeper_evicts_expired_entries() {
    let mut options = PoolOptions::default();
    options.connection_ttl = TtlPolicy::new(Duration::from_millis(30), Duration::from_secs(60));
    let harness = PoolHarness::with_options(two_server_store("alice"), options);

    harness.service.ensure_connections("alice").await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(harness.service.cache().sweep_expired(), 1);
    assert!(harness.service.cache().is_empty());
    wait_for_close_counts(&harness, 1).await;
}

#[tokio::test]
async fn test_sliding_reads_keep_entry_alive() {
    let mut options = PoolOptions::default();
    options.connection_ttl = TtlPolicy::new(Duration::from_millis(80), Duration::from_secs(60));
    let harness = PoolHarness::with_options(two_server_store("alice"), options);

    let first = harness.service.ensure_connections("alice").await.unwrap();

    // Keep touching the entry more often than the sliding window.
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let again = harness.service.ensure_connections("alice").await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    assert_eq!(harness.factory.calls_for("alpha"), 1);
}
