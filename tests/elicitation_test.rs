mod common;

use common::test_app::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn elicitation_response_requires_request_id() {
    let app = TestApp::spawn().await;
    let response = reqwest::Client::new()
        .post(app.url("/api/mcp/chat"))
        .json(&json!({
            "action": "elicitation_response",
            "response": { "action": "accept" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("requestId is required"));
}

#[tokio::test]
async fn unknown_request_id_returns_404_without_state_change() {
    let app = TestApp::spawn().await;
    assert_eq!(app.ctx.elicitations.pending_count(), 0);

    let response = reqwest::Client::new()
        .post(app.url("/api/mcp/chat"))
        .json(&json!({
            "action": "elicitation_response",
            "requestId": "elicit_0_nosuchkey",
            "response": { "action": "accept" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No pending elicitation found for this requestId");
    assert_eq!(app.ctx.elicitations.pending_count(), 0);
}

#[tokio::test]
async fn posted_payload_resolves_the_pending_entry_verbatim() {
    let app = TestApp::spawn().await;
    let (request_id, rx) = app.ctx.elicitations.register();

    let payload = json!({
        "action": "accept",
        "content": { "city": "Lisbon", "confirmed": true }
    });

    let response = reqwest::Client::new()
        .post(app.url("/api/mcp/chat"))
        .json(&json!({
            "action": "elicitation_response",
            "requestId": request_id,
            "response": payload
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    // Round-trip identity: the awaiting side receives exactly what was posted
    let received = rx.await.unwrap();
    assert_eq!(received, payload);
    assert_eq!(app.ctx.elicitations.pending_count(), 0);
}

#[tokio::test]
async fn entries_are_one_shot_across_the_http_surface() {
    let app = TestApp::spawn().await;
    let (request_id, _rx) = app.ctx.elicitations.register();
    let client = reqwest::Client::new();

    let first = client
        .post(app.url("/api/mcp/chat"))
        .json(&json!({
            "action": "elicitation_response",
            "requestId": request_id,
            "response": { "action": "decline" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    // The entry is gone; a second answer finds nothing
    let second = client
        .post(app.url("/api/mcp/chat"))
        .json(&json!({
            "action": "elicitation_response",
            "requestId": request_id,
            "response": { "action": "decline" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 404);
}

#[tokio::test]
async fn timed_out_entries_are_rejected_and_removed() {
    let app = TestApp::spawn().await;
    let registry = app.ctx.elicitations.clone();
    let (request_id, rx) = registry.register();

    let result = registry
        .wait(&request_id, rx, std::time::Duration::from_millis(30))
        .await;
    assert!(result.is_err());

    // Subsequent lookups through the HTTP surface now 404
    let response = reqwest::Client::new()
        .post(app.url("/api/mcp/chat"))
        .json(&json!({
            "action": "elicitation_response",
            "requestId": request_id,
            "response": { "action": "accept" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
