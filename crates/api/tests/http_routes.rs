//! Router coverage through `tower::ServiceExt::oneshot`.

mod support;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use stocksync_core::webhook::signature;
use stocksync_server::router;
use support::{json_body, TestApp, WEBHOOK_SECRET};
use tower::ServiceExt;

fn webhook_body(event_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "eventId": event_id,
        "date": "2025-03-10T12:00:00Z",
        "version": "v1",
        "event": "stock.updated",
        "companyId": "c0ffee",
        "data": {
            "produto": {"id": 77},
            "deposito": {"id": 1, "saldoFisico": 5, "saldoVirtual": 4},
            "saldoFisicoTotal": 5,
            "saldoVirtualTotal": 4
        }
    }))
    .unwrap()
}

fn signed_webhook(body: Vec<u8>) -> Request<Body> {
    let signature = signature::sign(WEBHOOK_SECRET, &body);
    Request::builder()
        .method("POST")
        .uri("/webhooks/bling")
        .header("content-type", "application/json")
        .header("X-Bling-Signature-256", signature)
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_components_and_sync_state() {
    let app = TestApp::new().await;

    let response = router(app.ctx.clone()).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["isHealthy"], true);
    assert_eq!(body["integrationActive"], false);
    assert_eq!(body["sync"]["locked"], false);
    assert_eq!(body["components"].as_array().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_is_unavailable_without_webhook_secret() {
    let app = TestApp::with_secret(None).await;

    let response = router(app.ctx.clone()).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test(flavor = "multi_thread")]
async fn signed_webhook_is_accepted_and_listed() {
    let app = TestApp::new().await;

    let response =
        router(app.ctx.clone()).oneshot(signed_webhook(webhook_body("evt-1"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"success": true}));

    let response =
        router(app.ctx.clone()).oneshot(get("/api/webhooks/events?limit=10")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let events = json_body(response).await;
    assert_eq!(events[0]["eventId"], "evt-1");
    assert_eq!(events[0]["resource"], "stock");
    assert_eq!(events[0]["action"], "updated");
}

#[tokio::test(flavor = "multi_thread")]
async fn deferred_processing_marks_event_processed() {
    let app = TestApp::new().await;

    router(app.ctx.clone()).oneshot(signed_webhook(webhook_body("evt-async"))).await.unwrap();

    let mut processed = false;
    for _ in 0..50 {
        let events = app.ctx.webhooks.history(1).await.unwrap();
        if events.first().is_some_and(|event| event.processed) {
            processed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(processed, "spawned processing should record an outcome");
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_webhook_is_acknowledged() {
    let app = TestApp::new().await;

    router(app.ctx.clone()).oneshot(signed_webhook(webhook_body("evt-dup"))).await.unwrap();
    let response =
        router(app.ctx.clone()).oneshot(signed_webhook(webhook_body("evt-dup"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["duplicate"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn unsigned_webhook_is_rejected() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/bling")
        .body(Body::from(webhook_body("evt-unsigned")))
        .unwrap();
    let response = router(app.ctx.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.ctx.webhooks.history(10).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_webhook_body_is_bad_request() {
    let app = TestApp::new().await;

    let response = router(app.ctx.clone()).oneshot(signed_webhook(Vec::new())).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn webhook_without_configured_secret_is_server_error() {
    let app = TestApp::with_secret(None).await;

    let response =
        router(app.ctx.clone()).oneshot(signed_webhook(webhook_body("evt-x"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_request_is_accepted_and_recorded() {
    let app = TestApp::new().await;

    let response = router(app.ctx.clone())
        .oneshot(post_json("/api/sync", json!({"kind": "products"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let outcome = json_body(response).await;
    assert_eq!(outcome["queued"], false);
    assert_eq!(outcome["queuePosition"], 0);
    let run_id = outcome["runId"].as_str().unwrap().to_string();

    let response = router(app.ctx.clone()).oneshot(get("/api/sync/runs")).await.unwrap();
    let runs = json_body(response).await;
    assert_eq!(runs[0]["id"], run_id);
    assert_eq!(runs[0]["kind"], "products");
    assert_eq!(runs[0]["triggeredBy"], "manual");
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_sync_kind_is_bad_request() {
    let app = TestApp::new().await;

    let response = router(app.ctx.clone())
        .oneshot(post_json("/api/sync", json!({"kind": "invoices"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("invoices"));
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_status_is_reported() {
    let app = TestApp::new().await;

    let response = router(app.ctx.clone()).oneshot(get("/api/sync/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["queueDepth"], 0);
    assert!(body["pausedUntil"].is_null());
}
