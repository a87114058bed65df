//! The six end-to-end scenarios: literal inputs driven over the HTTP
//! surface, asserting the literal outputs.

use std::time::Duration;

use lightq_engine::EngineConfig;
use lightq_test::test_server;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn group_header(name: &str) -> (&'static str, String) {
    ("consumerGroup", name.to_owned())
}

#[tokio::test]
async fn push_pop_fifo() {
    let server = test_server(|_| {});
    let (header, g1) = group_header("g1");

    for content in ["A", "B", "C"] {
        let response = server.post("/queue/push").add_header(header, g1.clone()).text(content).await;
        response.assert_status_ok();
    }

    for expected in ["A", "B", "C"] {
        let popped = server.get("/queue/pop").add_header(header, g1.clone()).await;
        popped.assert_status_ok();
        let body: Value = popped.json();
        assert_eq!(body["content"], expected);
        let id = body["id"].as_str().unwrap().to_owned();
        server.post("/queue/ack").add_header(header, g1.clone()).add_query_param("id", id).await.assert_status_ok();
    }

    server.get("/queue/pop").add_header(header, g1).await.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn visibility_expiry_redelivers() {
    let server = test_server(|c: &mut EngineConfig| c.visibility_timeout_seconds = 1);
    let (header, g2) = group_header("g2");

    server.post("/queue/push").add_header(header, g2.clone()).text("X").await.assert_status_ok();

    let first = server.get("/queue/pop").add_header(header, g2.clone()).await;
    first.assert_status_ok();
    let first_body: Value = first.json();
    let id = first_body["id"].as_str().unwrap().to_owned();

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let second = server.get("/queue/pop").add_header(header, g2.clone()).await;
    second.assert_status_ok();
    let second_body: Value = second.json();
    assert_eq!(second_body["id"], id);

    let view = server.get("/queue/view").add_header(header, g2).await;
    view.assert_status_ok();
    let entries: Vec<Value> = view.json();
    let entry = entries.iter().find(|m| m["id"] == id).unwrap();
    assert_eq!(entry["delivery_count"], 2);
}

#[tokio::test]
async fn nack_requeues_with_reason() {
    let server = test_server(|_| {});
    let (header, g3) = group_header("g3");

    server.post("/queue/push").add_header(header, g3.clone()).text("Y").await.assert_status_ok();
    let popped: Value = server.get("/queue/pop").add_header(header, g3.clone()).await.json();
    let id = popped["id"].as_str().unwrap().to_owned();

    server
        .post("/queue/nack")
        .add_header(header, g3.clone())
        .add_query_param("id", id.clone())
        .add_query_param("reason", "r")
        .await
        .assert_status_ok();

    let again: Value = server.get("/queue/pop").add_header(header, g3.clone()).await.json();
    assert_eq!(again["id"], id);

    let view: Vec<Value> = server.get("/queue/view").add_header(header, g3).await.json();
    let entry = view.iter().find(|m| m["id"] == id).unwrap();
    assert_eq!(entry["delivery_count"], 2);
    assert_eq!(entry["last_error"], "r");
}

#[tokio::test]
async fn dlq_triage_after_max_deliveries() {
    let server = test_server(|c: &mut EngineConfig| c.max_delivery_attempts = 2);
    let (header, g4) = group_header("g4");

    server.post("/queue/push").add_header(header, g4.clone()).text("Z").await.assert_status_ok();

    for _ in 0..2 {
        let popped: Value = server.get("/queue/pop").add_header(header, g4.clone()).await.json();
        let id = popped["id"].as_str().unwrap().to_owned();
        server
            .post("/queue/nack")
            .add_header(header, g4.clone())
            .add_query_param("id", id)
            .await
            .assert_status_ok();
    }

    server.get("/queue/pop").add_header(header, g4.clone()).await.assert_status(axum::http::StatusCode::NOT_FOUND);

    let dlq: Vec<Value> = server.get("/queue/dlq/view").add_header(header, g4).await.json();
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq[0]["content"], json!([b'Z']));
    assert_eq!(dlq[0]["dlq_reason"], "max-deliveries");
}

#[tokio::test]
async fn scheduled_delivery_waits_for_due_time() {
    let server = test_server(|_| {});
    let (header, g5) = group_header("g5");

    let scheduled_at = chrono::Utc::now() + chrono::Duration::seconds(2);
    server
        .post("/queue/push")
        .add_header(header, g5.clone())
        .add_query_param("scheduledAt", scheduled_at.to_rfc3339())
        .text("S")
        .await
        .assert_status_ok();

    server.get("/queue/pop").add_header(header, g5.clone()).await.assert_status(axum::http::StatusCode::NOT_FOUND);

    tokio::time::sleep(Duration::from_secs(2)).await;

    let popped = server.get("/queue/pop").add_header(header, g5).await;
    popped.assert_status_ok();
    let body: Value = popped.json();
    assert_eq!(body["content"], "S");
}

#[tokio::test]
async fn dlq_replay_reissues_fresh_id() {
    let server = test_server(|c: &mut EngineConfig| c.max_delivery_attempts = 2);
    let (header, g4) = group_header("g4");

    server.post("/queue/push").add_header(header, g4.clone()).text("Z").await.assert_status_ok();
    for _ in 0..2 {
        let popped: Value = server.get("/queue/pop").add_header(header, g4.clone()).await.json();
        let id = popped["id"].as_str().unwrap().to_owned();
        server
            .post("/queue/nack")
            .add_header(header, g4.clone())
            .add_query_param("id", id)
            .await
            .assert_status_ok();
    }
    server.get("/queue/pop").add_header(header, g4.clone()).await.assert_status(axum::http::StatusCode::NOT_FOUND);

    let dlq: Vec<Value> = server.get("/queue/dlq/view").add_header(header, g4.clone()).await.json();
    let dlq_id = dlq[0]["id"].as_str().unwrap().to_owned();

    let replayed: u64 = server.post("/queue/dlq/replay").add_header(header, g4.clone()).json(&vec![dlq_id]).await.json();
    assert_eq!(replayed, 1);

    let popped = server.get("/queue/pop").add_header(header, g4.clone()).await;
    popped.assert_status_ok();
    let body: Value = popped.json();
    assert_eq!(body["content"], "Z");
    assert_ne!(body["id"].as_str().unwrap(), dlq[0]["id"].as_str().unwrap());

    let dlq_after: Vec<Value> = server.get("/queue/dlq/view").add_header(header, g4).await.json();
    assert!(dlq_after.is_empty());
}
