mod common;

use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use smart_bookmark::routes::app_router;

async fn server() -> TestServer {
    let (engine, _) = common::create_test_engine().await;
    let (state, _rx) = common::create_test_state(engine);
    let app = Router::new().fallback_service(app_router(state));
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_alarm_by_name() {
    let server = server().await;

    let response = server.post("/api/alarms/retryQueue").await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["alarm"], "retryQueue");
    assert_eq!(json["result"]["attempted"], 0);

    let response = server.post("/api/alarms/storageCheck").await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["alarm"], "storageCheck");
}

#[tokio::test]
async fn test_unknown_alarm_not_found() {
    let server = server().await;

    let response = server.post("/api/alarms/hourly").await;

    response.assert_status_not_found();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["error"]["code"], "not_found");
    assert_eq!(json["error"]["details"]["alarm"], "hourly");
}

#[tokio::test]
async fn test_manual_cleanup() {
    let server = server().await;

    let response = server.post("/api/cleanup").await;

    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["status"], "completed");
}

#[tokio::test]
async fn test_settings_read_and_reload() {
    let server = server().await;

    let response = server.get("/api/settings").await;
    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["settings"]["threshold"], 3);
    assert_eq!(json["exclusions"][0]["pattern"], "chrome://*");

    let response = server.post("/api/settings/reload/").await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["settings"]["enabled"], true);
}

#[tokio::test]
async fn test_visit_through_full_router() {
    let server = server().await;

    server
        .post("/api/visits")
        .json(&json!({ "url": "https://example.com/" }))
        .await
        .assert_status(axum::http::StatusCode::ACCEPTED);

    server.get("/health").await.assert_status_ok();
}
