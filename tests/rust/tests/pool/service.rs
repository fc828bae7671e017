//! End-to-end service behavior: secret injection into connection
//! parameters, plugin attachment, and disconnect semantics.

use serde_json::json;
use tests::harness::{stdio_config, PoolHarness};
use tests::mocks::MockPluginHost;
use tokio_util::sync::CancellationToken;
use toolmux_core::{Capability, ConfigTier, ServerConfig, StaticConfigStore};
use toolmux_pool::ResolvedTransport;

#[tokio::test]
async fn test_secrets_injected_into_env_and_headers() {
    let store = StaticConfigStore::new()
        .with_user_server(
            "alice",
            ServerConfig::stdio_from_stored(
                "github",
                true,
                ConfigTier::User,
                "npx",
                Some(r#"["--token", "${input:ghToken}"]"#),
                Some(r#"{"GITHUB_TOKEN": "${input:ghToken}"}"#),
            ),
        )
        .with_user_server(
            "alice",
            ServerConfig::event_stream_from_stored(
                "api",
                true,
                ConfigTier::User,
                "https://example.com/mcp",
                Some(r#"{"Authorization": "Bearer ${input:apiKey}"}"#),
            ),
        );
    let harness = PoolHarness::new(store);
    harness.store_secret("alice", "ghToken", "gh-secret");
    harness.store_secret("alice", "apiKey", "api-secret");

    harness.service.ensure_connections("alice").await.unwrap();

    for (server, transport) in harness.factory.transports() {
        match (server.as_str(), transport) {
            ("github", ResolvedTransport::Stdio { command, args, env }) => {
                assert_eq!(command, "npx");
                assert_eq!(args, vec!["--token", "gh-secret"]);
                assert_eq!(env.get("GITHUB_TOKEN").unwrap(), "gh-secret");
            }
            ("api", ResolvedTransport::EventStream { url, headers }) => {
                assert_eq!(url, "https://example.com/mcp");
                assert_eq!(headers.get("Authorization").unwrap(), "Bearer api-secret");
            }
            (server, transport) => panic!("unexpected create: {} {:?}", server, transport),
        }
    }
}

#[tokio::test]
async fn test_missing_secret_becomes_empty_string() {
    let store = StaticConfigStore::new().with_user_server(
        "alice",
        ServerConfig::stdio_from_stored(
            "github",
            true,
            ConfigTier::User,
            "npx",
            None,
            Some(r#"{"GITHUB_TOKEN": "${input:neverStored}"}"#),
        ),
    );
    let harness = PoolHarness::new(store);

    harness.service.ensure_connections("alice").await.unwrap();

    let transports = harness.factory.transports();
    match &transports[0].1 {
        ResolvedTransport::Stdio { env, .. } => {
            assert_eq!(env.get("GITHUB_TOKEN").unwrap(), "");
        }
        other => panic!("unexpected transport: {:?}", other),
    }
}

#[tokio::test]
async fn test_attach_plugins_offers_capabilities() {
    let store = StaticConfigStore::new()
        .with_global(stdio_config("alpha", ConfigTier::Global, "cmd-a"))
        .with_global(stdio_config("beta", ConfigTier::Global, "cmd-b"));
    let harness = PoolHarness::new(store);
    harness.factory.set_capabilities(
        "alpha",
        vec![Capability {
            name: "search".to_string(),
            description: Some("Full-text search".to_string()),
            input_schema: json!({"type": "object"}),
        }],
    );

    let host = MockPluginHost::new();
    let attached = harness.service.attach_plugins(&host, "alice").await.unwrap();

    assert_eq!(attached, 2);
    assert_eq!(host.attached_count("alice"), 2);

    let connections = harness.service.ensure_connections("alice").await.unwrap();
    let alpha = connections
        .iter()
        .find(|c| c.server_name == "alpha")
        .unwrap();
    assert_eq!(alpha.plugin.len(), 1);
    assert_eq!(alpha.plugin.capabilities[0].name, "search");
}

#[tokio::test]
async fn test_attach_plugins_skips_already_attached_names() {
    let store = StaticConfigStore::new()
        .with_global(stdio_config("alpha", ConfigTier::Global, "cmd-a"))
        .with_global(stdio_config("beta", ConfigTier::Global, "cmd-b"));
    let harness = PoolHarness::new(store);

    let host = MockPluginHost::new();
    host.preload("alice", "alpha");

    let attached = harness.service.attach_plugins(&host, "alice").await.unwrap();

    assert_eq!(attached, 1);
    assert_eq!(host.attached_count("alice"), 2);
}

#[tokio::test]
async fn test_disconnect_clears_status_cache_too() {
    let store = StaticConfigStore::new()
        .with_global(stdio_config("alpha", ConfigTier::Global, "cmd-a"));
    let harness = PoolHarness::new(store);
    let cancel = CancellationToken::new();

    harness.service.get_statuses("alice", &cancel).await.unwrap();
    let before = harness.factory.calls_for("alpha");

    harness.service.disconnect_user("alice");

    harness.service.get_statuses("alice", &cancel).await.unwrap();
    assert_eq!(harness.factory.calls_for("alpha"), before + 1);
}

#[tokio::test]
async fn test_disconnect_unknown_user_is_noop() {
    let harness = PoolHarness::new(StaticConfigStore::new());
    harness.service.disconnect_user("ghost");
    assert!(harness.service.cache().is_empty());
}
