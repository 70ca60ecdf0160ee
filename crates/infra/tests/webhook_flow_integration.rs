//! Webhook pipeline wired to the SQLite repositories.

mod support;

use std::sync::Arc;

use serde_json::json;
use stocksync_common::clock::MockClock;
use stocksync_core::webhook::signature;
use stocksync_core::{ProcessOutcome, WebhookEventRepository, WebhookPipeline, WebhookResponse, WebhookRouter};
use stocksync_infra::database::{SqliteCatalogStore, SqliteWebhookEventRepository};
use support::{at, TestDatabase};

const SECRET: &str = "hook-secret";

struct Harness {
    _db: TestDatabase,
    events: Arc<SqliteWebhookEventRepository>,
    catalog: Arc<SqliteCatalogStore>,
    pipeline: WebhookPipeline,
}

fn harness() -> Harness {
    let db = TestDatabase::new();
    let events = Arc::new(SqliteWebhookEventRepository::new(Arc::clone(&db.manager)));
    let catalog = Arc::new(SqliteCatalogStore::new(Arc::clone(&db.manager)));
    let pipeline = WebhookPipeline::new(
        events.clone(),
        WebhookRouter::new(catalog.clone()),
        Arc::new(MockClock::at(at(15, 0))),
        Some(SECRET.to_string()),
    );
    Harness { _db: db, events, catalog, pipeline }
}

fn product_event(event_id: &str, name: &str, date: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "eventId": event_id,
        "date": date,
        "version": "v1",
        "event": "product.updated",
        "companyId": "c0ffee",
        "data": {"id": 321, "nome": name, "codigo": "SKU-321", "preco": 12.5}
    }))
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn signed_product_event_is_stored_then_applied() {
    let h = harness();
    let body = product_event("evt-100", "Caneca", "2025-03-10T14:59:00Z");

    let receipt = h.pipeline.receive(&body, Some(&signature::sign(SECRET, &body))).await;
    assert_eq!(receipt.response, WebhookResponse::Accepted);

    // Stored before any side effect.
    let stored = h.events.get("evt-100").await.unwrap().unwrap();
    assert!(!stored.processed);
    assert!(h.catalog.get_product(321).await.unwrap().is_none());

    let outcome = h.pipeline.process(receipt.deferred.unwrap()).await;
    assert_eq!(outcome, ProcessOutcome::Processed);

    let product = h.catalog.get_product(321).await.unwrap().unwrap();
    assert_eq!(product.name, "Caneca");
    assert!(h.events.get("evt-100").await.unwrap().unwrap().processed);
}

#[tokio::test(flavor = "multi_thread")]
async fn redelivery_is_acknowledged_without_reapplying() {
    let h = harness();
    let body = product_event("evt-200", "Primeiro", "2025-03-10T14:00:00Z");
    let sig = signature::sign(SECRET, &body);

    let first = h.pipeline.receive(&body, Some(&sig)).await;
    h.pipeline.process(first.deferred.unwrap()).await;

    let second = h.pipeline.receive(&body, Some(&sig)).await;
    assert_eq!(second.response, WebhookResponse::Duplicate);
    assert_eq!(second.response.status_code(), 200);
    assert!(second.deferred.is_none());
    assert_eq!(h.pipeline.history(10).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn forged_signature_is_not_persisted() {
    let h = harness();
    let body = product_event("evt-300", "Falso", "2025-03-10T14:00:00Z");

    let receipt = h.pipeline.receive(&body, Some(&signature::sign("wrong", &body))).await;
    assert_eq!(receipt.response.status_code(), 401);
    assert!(!h.events.exists("evt-300").await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn older_event_does_not_overwrite_newer_state() {
    let h = harness();

    let newer = product_event("evt-b", "Novo", "2025-03-10T14:30:00Z");
    let older = product_event("evt-a", "Antigo", "2025-03-10T14:10:00Z");

    for body in [newer, older] {
        let receipt = h.pipeline.receive(&body, Some(&signature::sign(SECRET, &body))).await;
        h.pipeline.process(receipt.deferred.unwrap()).await;
    }

    assert_eq!(h.catalog.get_product(321).await.unwrap().unwrap().name, "Novo");
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_event_is_recorded_with_error() {
    let h = harness();
    let body = serde_json::to_vec(&json!({
        "eventId": "evt-400",
        "event": "invoice.created",
        "data": {"id": 1}
    }))
    .unwrap();

    let receipt = h.pipeline.receive(&body, Some(&signature::sign(SECRET, &body))).await;
    assert_eq!(receipt.response, WebhookResponse::Accepted);

    let outcome = h.pipeline.process(receipt.deferred.unwrap()).await;
    assert!(matches!(outcome, ProcessOutcome::ProcessedWithError(_)));

    let stored = h.events.get("evt-400").await.unwrap().unwrap();
    assert!(stored.processed);
    assert!(stored.error.unwrap().contains("invoice"));
}
