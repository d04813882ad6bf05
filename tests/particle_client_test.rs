//! Integration tests for the Particle cloud client against a mock HTTP server

use httpmock::prelude::*;
use parking_spotter::domain::types::OccupancyStatus;
use parking_spotter::infra::Config;
use parking_spotter::io::{ParticleClient, RemoteError, ZoneRemote};
use std::time::{Duration, Instant};

fn client_for(server: &MockServer) -> ParticleClient {
    let config = Config::default()
        .with_credentials(Some("tok".to_string()), Some("dev-1".to_string()))
        .with_particle_base_url(server.url("/v1/devices"));
    ParticleClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_in_zone_true() {
    let server = MockServer::start();
    let zone_mock = server.mock(|when, then| {
        when.method(GET).path("/v1/devices/dev-1/home").query_param("access_token", "tok");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({"cmd": "VarReturn", "name": "home", "result": true}));
    });

    let mut client = client_for(&server);
    assert!(client.is_in_zone().await.unwrap());
    zone_mock.assert();
}

#[tokio::test]
async fn test_missing_result_means_not_in_zone() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/devices/dev-1/home");
        then.status(200).json_body(serde_json::json!({"cmd": "VarReturn", "name": "home"}));
    });

    let mut client = client_for(&server);
    assert!(!client.is_in_zone().await.unwrap());
}

#[tokio::test]
async fn test_http_error_is_a_failure_not_false() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/devices/dev-1/home");
        then.status(502);
    });

    let mut client = client_for(&server);
    let err = client.is_in_zone().await.unwrap_err();
    assert!(matches!(err, RemoteError::Status { status: 502, .. }));
}

#[tokio::test]
async fn test_garbage_body_is_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/devices/dev-1/home");
        then.status(200).body("<html>maintenance</html>");
    });

    let mut client = client_for(&server);
    assert!(matches!(client.is_in_zone().await, Err(RemoteError::Decode(_))));
}

#[tokio::test]
async fn test_publish_sends_tag_and_token() {
    let server = MockServer::start();
    let publish_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/devices/dev-1/parkingStatus")
            .body_contains("arg=TRAFFIC")
            .body_contains("access_token=tok");
        then.status(200).json_body(serde_json::json!({"id": "dev-1", "return_value": 1}));
    });

    let mut client = client_for(&server);
    client.publish(OccupancyStatus::NearClearWithObstruction).await.unwrap();
    publish_mock.assert();
}

#[tokio::test]
async fn test_publish_failure_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/devices/dev-1/parkingStatus");
        then.status(400).json_body(serde_json::json!({"ok": false, "error": "Timed out."}));
    });

    let mut client = client_for(&server);
    let err = client.publish(OccupancyStatus::Occupied).await.unwrap_err();
    assert!(matches!(err, RemoteError::Status { status: 400, .. }));
}

#[tokio::test]
async fn test_zone_queries_are_paced() {
    let server = MockServer::start();
    let zone_mock = server.mock(|when, then| {
        when.method(GET).path("/v1/devices/dev-1/home");
        then.status(200).json_body(serde_json::json!({"result": false}));
    });

    let mut client = client_for(&server);
    let start = Instant::now();
    client.is_in_zone().await.unwrap();
    client.is_in_zone().await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(1000));
    zone_mock.assert_hits(2);
}
