use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kite_automation::engine::SharedResources;
use kite_automation::proxy::ProxyPool;
use kite_automation::registry::EndpointRegistry;
use kite_automation::scheduler::run_sessions;
use kite_automation::session::WalletSession;
use kite_automation::types::AgentEndpoint;

const SSE_OK: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
    "data: [DONE]\n\n"
);

async fn mount_feed(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v2/advanced-filters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "hash": "0xfeedbeef" }]
        })))
        .mount(server)
        .await;
}

async fn mount_chat(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/main"))
        .and(body_partial_json(serde_json::json!({ "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(SSE_OK, "text/event-stream"),
        )
        .mount(server)
        .await;
}

fn shared_for(server: &MockServer, max_cycles: u64) -> Arc<SharedResources> {
    let registry = EndpointRegistry::new(
        vec![AgentEndpoint {
            url: format!("{}/main", server.uri()),
            agent_id: "deployment_test".to_string(),
            name: "Test Agent".to_string(),
        }],
        0,
    )
    .unwrap();

    Arc::new(SharedResources {
        proxies: ProxyPool::new(Vec::new(), Duration::from_secs(5)).unwrap(),
        registry,
        questions: vec!["What is Kite AI?".to_string()],
        feed_url: format!("{}/api/v2/advanced-filters", server.uri()),
        usage_url: format!("{}/api/report_usage", server.uri()),
        cooldown_min_secs: 0.01,
        cooldown_max_secs: 0.02,
        max_cycles: Some(max_cycles),
    })
}

fn sessions_for(shared: &SharedResources, wallets: &[&str]) -> Vec<WalletSession> {
    let names = shared.registry.agent_names();
    let now = Utc::now();
    wallets
        .iter()
        .enumerate()
        .map(|(i, w)| WalletSession::new((*w).to_string(), i + 1, &names, now))
        .collect()
}

#[tokio::test]
async fn three_wallets_one_cycle_each_earn_ten_points() {
    let server = MockServer::start().await;
    mount_feed(&server).await;
    mount_chat(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/report_usage"))
        .and(body_partial_json(serde_json::json!({
            "agent_id": "deployment_test",
            "request_text": "What is Kite AI?",
            "response_text": "ok",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let shared = shared_for(&server, 1);
    let sessions = sessions_for(&shared, &["0xwallet1", "0xwallet2", "0xwallet3"]);

    let (_stop_tx, stop_rx) = watch::channel(false);
    let finished = run_sessions(shared, sessions, stop_rx).await;

    assert_eq!(finished.len(), 3);
    for session in &finished {
        assert_eq!(session.stats.total_points, 10, "wallet {}", session.wallet);
        assert_eq!(session.stats.successes, 1);
        assert_eq!(session.stats.failures, 0);
        assert_eq!(session.stats.total_interactions, 1);
        assert_eq!(session.daily_points, 10);
        assert_eq!(session.stats.interactions_by_agent["Test Agent"], 1);
    }
    server.verify().await;
}

#[tokio::test]
async fn rejected_usage_report_earns_nothing() {
    let server = MockServer::start().await;
    mount_feed(&server).await;
    mount_chat(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/report_usage"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let shared = shared_for(&server, 1);
    let sessions = sessions_for(&shared, &["0xwallet1"]);

    let (_stop_tx, stop_rx) = watch::channel(false);
    let finished = run_sessions(shared, sessions, stop_rx).await;

    assert_eq!(finished.len(), 1);
    let session = &finished[0];
    assert_eq!(session.daily_points, 0);
    assert_eq!(session.stats.total_points, 0);
    assert_eq!(session.stats.successes, 0);
    assert_eq!(session.stats.failures, 1);
    assert_eq!(session.stats.total_interactions, 1);
}

#[tokio::test]
async fn unreachable_feed_and_chat_still_complete_the_cycle() {
    let server = MockServer::start().await;
    // No feed or chat mocks: both calls 404 and count as network failures.
    // The feed failure substitutes an empty analysis pool, the chat failure
    // an empty answer; the cycle still reports usage.
    Mock::given(method("POST"))
        .and(path("/api/report_usage"))
        .and(body_partial_json(serde_json::json!({ "response_text": "" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let shared = shared_for(&server, 1);
    let sessions = sessions_for(&shared, &["0xwallet1"]);

    let (_stop_tx, stop_rx) = watch::channel(false);
    let finished = run_sessions(shared, sessions, stop_rx).await;

    let session = &finished[0];
    assert_eq!(session.stats.successes, 1);
    assert_eq!(session.daily_points, 10);
    server.verify().await;
}

#[tokio::test]
async fn feed_non_2xx_is_a_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/advanced-filters"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    // A rejected feed response must surface as Err so the engine's failure
    // arm logs and rotates the proxy, instead of passing for zero transfers.
    let client = reqwest::Client::new();
    let result = kite_automation::api::fetch_recent_transfers(
        &client,
        &format!("{}/api/v2/advanced-filters", server.uri()),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn feed_non_json_success_counts_as_zero_transfers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/advanced-filters"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let hashes = kite_automation::api::fetch_recent_transfers(
        &client,
        &format!("{}/api/v2/advanced-filters", server.uri()),
    )
    .await
    .unwrap();
    assert!(hashes.is_empty());
}

#[tokio::test]
async fn concurrent_sessions_do_not_share_state() {
    let server = MockServer::start().await;
    mount_feed(&server).await;
    mount_chat(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/report_usage"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // Two sessions, three cycles each: every session accounts for exactly
    // its own interactions.
    let shared = shared_for(&server, 3);
    let sessions = sessions_for(&shared, &["0xalpha", "0xbeta"]);

    let (_stop_tx, stop_rx) = watch::channel(false);
    let finished = run_sessions(shared, sessions, stop_rx).await;

    assert_eq!(finished.len(), 2);
    for session in &finished {
        assert_eq!(session.stats.total_interactions, 3);
        assert_eq!(session.stats.successes, 3);
        assert_eq!(session.daily_points, 30);
        assert_eq!(session.stats.total_points, 30);
    }
}
