use pretty_assertions::assert_eq;
use savesync_relay::{DEFAULT_MAX_SNAPSHOT_BYTES, InfoResponse, RelayState, build_router};
use savesync_types::{DeviceId, Platform, Snapshot, UserId};
use std::sync::Arc;

/// Spin up the HTTP server on an OS-assigned port, returning the base URL.
async fn spawn_test_server(token: Option<&str>) -> String {
    serve(RelayState::new(token.map(str::to_string))).await
}

async fn serve(state: RelayState) -> String {
    let app = build_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

fn snapshot(user: &str) -> Snapshot {
    Snapshot::new_default(UserId::new(user), DeviceId::new(), Platform::Web)
}

#[tokio::test]
async fn info_endpoint_reports_service() {
    let base = spawn_test_server(None).await;
    let resp = reqwest::get(format!("{}/api/v1/info", base)).await.unwrap();

    assert_eq!(resp.status(), 200);
    let body: InfoResponse = resp.json().await.unwrap();
    assert_eq!(body.service, "savesync-relay");
    assert_eq!(body.snapshots, 0);
    assert!(!body.auth_required);
}

#[tokio::test]
async fn missing_snapshot_returns_404() {
    let base = spawn_test_server(None).await;
    let resp = reqwest::get(format!("{}/api/v1/snapshots/nobody", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn put_then_get_returns_same_snapshot() {
    let base = spawn_test_server(None).await;
    let client = reqwest::Client::new();
    let stored = snapshot("player-1");

    let put = client
        .put(format!("{}/api/v1/snapshots/player-1", base))
        .json(&stored)
        .send()
        .await
        .unwrap();
    assert_eq!(put.status(), 204);

    let fetched: Snapshot = client
        .get(format!("{}/api/v1/snapshots/player-1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, stored);

    let info: InfoResponse = reqwest::get(format!("{}/api/v1/info", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info.snapshots, 1);
}

#[tokio::test]
async fn put_for_another_user_is_rejected() {
    let base = spawn_test_server(None).await;
    let resp = reqwest::Client::new()
        .put(format!("{}/api/v1/snapshots/player-1", base))
        .json(&snapshot("player-2"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    assert!(resp.text().await.unwrap().contains("player-2"));
}

#[tokio::test]
async fn token_is_required_when_configured() {
    let base = spawn_test_server(Some("s3cret")).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/snapshots/player-1", base);

    let anonymous = client.get(&url).send().await.unwrap();
    assert_eq!(anonymous.status(), 401);

    let wrong = client.get(&url).bearer_auth("nope").send().await.unwrap();
    assert_eq!(wrong.status(), 401);

    let same_length = client.get(&url).bearer_auth("s3creT").send().await.unwrap();
    assert_eq!(same_length.status(), 401);

    let put = client
        .put(&url)
        .bearer_auth("s3cret")
        .json(&snapshot("player-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(put.status(), 204);

    let get = client.get(&url).bearer_auth("s3cret").send().await.unwrap();
    assert_eq!(get.status(), 200);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let base = serve(RelayState::new(None).with_max_snapshot_bytes(1024)).await;
    let client = reqwest::Client::new();

    let mut large = snapshot("player-1");
    large
        .payload
        .set_section("gameState", serde_json::json!({"blob": "x".repeat(4096)}));
    let resp = client
        .put(format!("{}/api/v1/snapshots/player-1", base))
        .json(&large)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);

    let small = client
        .put(format!("{}/api/v1/snapshots/player-1", base))
        .json(&snapshot("player-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(small.status(), 204);
}

#[test]
fn default_body_limit_fits_large_saves() {
    assert_eq!(
        RelayState::new(None).max_snapshot_bytes(),
        DEFAULT_MAX_SNAPSHOT_BYTES
    );
    assert!(DEFAULT_MAX_SNAPSHOT_BYTES > 2 * 1024 * 1024);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let base = spawn_test_server(None).await;
    let resp = reqwest::get(format!("{}/api/v1/nonexistent", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
