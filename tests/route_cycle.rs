//! End-to-end poll cycles against mocked Eve-Scout, ESI and Discord endpoints.

use serde_json::json;
use std::time::Duration;
use thera_route_watch::orchestrator::{CycleOutcome, CycleReport, Orchestrator};
use thera_route_watch::settings::Settings;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const THERA: u64 = 31000005;
const AMARR: u64 = 30002187;
const PERIMETER: u64 = 30000144;
const JITA: u64 = 30000142;

fn settings_for(server: &MockServer) -> Settings {
    settings_with_timeout(server, 10_000)
}

fn settings_with_timeout(server: &MockServer, request_timeout_ms: u64) -> Settings {
    let raw = format!(
        r#"
[discord]
bot_token = "test-token"
channel_id = 4242
mention_everyone = false

[[departure_systems]]
name = "Amarr"
system_id = {AMARR}

[[destinations]]
name = "Jita"
system_id = {JITA}
max_jumps = 10

[api]
signatures_url = "{uri}/v2/public/signatures"
esi_base_url = "{uri}/latest"
discord_api_url = "{uri}/api/v10"
request_timeout_ms = {request_timeout_ms}
"#,
        uri = server.uri()
    );
    Settings::from_toml_str(&raw).unwrap()
}

fn signatures() -> serde_json::Value {
    json!([
        {
            "id": "1001",
            "out_system_id": THERA,
            "out_system_name": "Thera",
            "out_signature": "THR-100",
            "in_system_id": PERIMETER,
            "in_system_name": "Perimeter",
            "in_region_name": "The Forge",
            "in_system_class": "hs",
            "in_signature": "PER-200",
            "wh_type": "Q063",
            "max_ship_size": "medium",
            "remaining_hours": 14
        },
        {
            "id": "1002",
            "out_system_id": THERA,
            "out_system_name": "Thera",
            "in_system_id": 31000777,
            "in_system_name": "J100001",
            "in_system_class": "c3"
        },
        {
            "id": "1003",
            "out_system_id": THERA,
            "out_system_name": "Thera",
            "in_system_id": THERA,
            "in_system_name": "Thera"
        },
        {
            "id": "1004",
            "out_system_id": 31000006,
            "out_system_name": "Turnur",
            "in_system_id": 30000145,
            "in_system_name": "New Caldari"
        }
    ])
}

async fn mount_feed(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v2/public/signatures"))
        .respond_with(ResponseTemplate::new(200).set_body_json(signatures()))
        .mount(server)
        .await;
}

async fn mount_routes(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/latest/route/{AMARR}/{PERIMETER}/")))
        .and(query_param("flag", "shortest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([AMARR, 1, 2, PERIMETER])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/latest/route/{PERIMETER}/{JITA}/")))
        .and(query_param("flag", "shortest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([PERIMETER, 1, 2, 3, JITA])))
        .mount(server)
        .await;
}

fn completed(outcome: CycleOutcome) -> CycleReport {
    match outcome {
        CycleOutcome::Completed(report) => report,
        CycleOutcome::Skipped => panic!("cycle unexpectedly skipped"),
    }
}

#[tokio::test]
async fn test_same_wormhole_route_is_announced_once() {
    let server = MockServer::start().await;
    mount_feed(&server).await;
    mount_routes(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v10/channels/4242/messages"))
        .and(header("authorization", "Bot test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "1" })))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_settings(&settings_for(&server)).unwrap();

    let first = completed(orchestrator.run_cycle().await);
    assert_eq!(first.raw_connections, 3);
    assert_eq!(first.routable_connections, 1);
    assert_eq!(first.candidates, 1);
    assert_eq!(first.notified, 1);

    let second = completed(orchestrator.run_cycle().await);
    assert_eq!(second.candidates, 1);
    assert_eq!(second.notified, 0);
    assert_eq!(second.suppressed, 1);

    let status = orchestrator.status();
    assert_eq!(status.tracked_routes, 1);
    // Second cycle reads both legs from the cache
    assert_eq!(status.distance_cache.misses, 2);
    assert_eq!(status.distance_cache.hits, 2);
}

#[tokio::test]
async fn test_failed_delivery_is_not_retried_within_cooldown() {
    let server = MockServer::start().await;
    mount_feed(&server).await;
    mount_routes(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_settings(&settings_for(&server)).unwrap();

    let first = completed(orchestrator.run_cycle().await);
    assert_eq!(first.delivery_failures, 1);
    assert_eq!(first.notified, 0);

    let second = completed(orchestrator.run_cycle().await);
    assert_eq!(second.suppressed, 1);
    assert_eq!(second.delivery_failures, 0);
}

#[tokio::test]
async fn test_esi_outage_produces_no_alerts() {
    let server = MockServer::start().await;
    mount_feed(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/latest/route/{AMARR}/{PERIMETER}/")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/latest/route/{PERIMETER}/{JITA}/")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_settings(&settings_for(&server)).unwrap();
    let report = completed(orchestrator.run_cycle().await);
    assert_eq!(report.routable_connections, 1);
    assert_eq!(report.candidates, 0);
    assert_eq!(orchestrator.status().distance_cache.lookup_failures, 2);
}

#[tokio::test]
async fn test_slow_route_lookup_times_out_without_blocking_cycle() {
    let server = MockServer::start().await;
    mount_feed(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/latest/route/{AMARR}/{PERIMETER}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([AMARR, 1, 2, PERIMETER])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/latest/route/{PERIMETER}/{JITA}/")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([PERIMETER, 1, 2, 3, JITA]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_settings(&settings_with_timeout(&server, 300)).unwrap();
    let report = tokio::time::timeout(Duration::from_secs(3), orchestrator.run_cycle())
        .await
        .map(completed)
        .expect("cycle should finish once the slow lookup times out");

    assert_eq!(report.routable_connections, 1);
    assert_eq!(report.candidates, 0);
    let cache = orchestrator.status().distance_cache;
    assert_eq!(cache.lookup_failures, 1);
    assert_eq!(cache.cache_size, 1);
}

#[tokio::test]
async fn test_feed_outage_is_an_empty_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/public/signatures"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_settings(&settings_for(&server)).unwrap();
    assert_eq!(
        completed(orchestrator.run_cycle().await),
        CycleReport::default()
    );
    assert!(orchestrator.list_connections().await.is_empty());
}
