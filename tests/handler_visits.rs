mod common;

use axum::{Router, routing::post};
use axum_test::TestServer;
use serde_json::json;
use smart_bookmark::api::handlers::record_visit_handler;
use smart_bookmark::domain::repositories::BookmarkManager;

fn app(state: smart_bookmark::state::AppState) -> TestServer {
    let app = Router::new()
        .route("/api/visits", post(record_visit_handler))
        .with_state(state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_visit_is_queued() {
    let (engine, _) = common::create_test_engine().await;
    let (state, mut rx) = common::create_test_state(engine);
    let server = app(state);

    let response = server
        .post("/api/visits")
        .json(&json!({ "url": "https://example.com/", "title": "Example" }))
        .await;

    response.assert_status(axum::http::StatusCode::ACCEPTED);
    assert_eq!(response.json::<serde_json::Value>()["status"], "queued");

    let event = rx.try_recv().unwrap();
    assert_eq!(event.url, "https://example.com/");
    assert_eq!(event.title, "Example");
}

#[tokio::test]
async fn test_visit_processed_inline_with_wait() {
    let (engine, bookmarks) = common::create_test_engine().await;
    let (state, _rx) = common::create_test_state(engine);
    let server = app(state);

    let visits = [
        ("2025-06-01T08:00:00Z", "recorded"),
        ("2025-06-01T09:00:00Z", "recorded"),
        ("2025-06-02T08:00:00Z", "promoted"),
    ];
    for (observed_at, expected) in visits {
        let response = server
            .post("/api/visits")
            .add_query_param("wait", "true")
            .json(&json!({
                "url": "https://example.com/docs",
                "title": "Docs",
                "observedAt": observed_at
            }))
            .await;

        response.assert_status_ok();
        let json = response.json::<serde_json::Value>();
        assert_eq!(json["status"], "processed");
        assert_eq!(json["outcome"]["status"], expected);
    }

    assert_eq!(
        bookmarks.search_by_url("https://example.com/docs").await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_invalid_url_rejected() {
    let (engine, _) = common::create_test_engine().await;
    let (state, _rx) = common::create_test_state(engine);
    let server = app(state);

    let response = server
        .post("/api/visits")
        .json(&json!({ "url": "not a url" }))
        .await;

    response.assert_status_bad_request();
    assert_eq!(
        response.json::<serde_json::Value>()["error"]["code"],
        "validation_error"
    );
}

#[tokio::test]
async fn test_unsupported_scheme_is_ignored() {
    let (engine, _) = common::create_test_engine().await;
    let (state, _rx) = common::create_test_state(engine.clone());
    let server = app(state);

    let response = server
        .post("/api/visits")
        .add_query_param("wait", "true")
        .json(&json!({ "url": "chrome://settings/" }))
        .await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["outcome"]["status"], "ignored");
    assert_eq!(json["outcome"]["detail"], "not_eligible");
    assert_eq!(engine.store().record_count().await, 0);
}

#[tokio::test]
async fn test_full_queue_returns_service_unavailable() {
    let (engine, _) = common::create_test_engine().await;
    let (tx, _rx) = tokio::sync::mpsc::channel(1);
    let state = smart_bookmark::state::AppState::new(engine, tx);
    let server = app(state);

    let body = json!({ "url": "https://example.com/" });
    server.post("/api/visits").json(&body).await.assert_status(axum::http::StatusCode::ACCEPTED);

    let response = server.post("/api/visits").json(&body).await;

    response.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.json::<serde_json::Value>()["error"]["code"],
        "service_unavailable"
    );
}
