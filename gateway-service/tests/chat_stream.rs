//! End-to-end tests for the chat relay: validation, the credit gate,
//! streaming, in-band errors and settlement.

mod common;

use common::{spawn_app, spawn_app_with, sse_data_payloads};
use gateway_service::services::providers::openrouter::OpenRouterProvider;
use gateway_service::services::store::Store;
use gateway_service::services::tokens::{calculate_cost, estimate_tokens};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;

fn chat_body(account_id: &str) -> Value {
    json!({
        "messages": [{"role": "user", "content": "Hello"}],
        "provider": "mock",
        "modelId": "test-model",
        "accountId": account_id
    })
}

#[tokio::test]
async fn missing_fields_are_rejected_with_bad_request() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    for body in [
        json!({}),
        json!({"messages": [{"role": "user", "content": "hi"}]}),
        json!({"messages": [{"role": "user", "content": "hi"}], "provider": "mock"}),
        json!({"messages": [], "provider": "mock", "modelId": "test-model"}),
    ] {
        let response = client
            .post(format!("{}/api/chat", app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status().as_u16(), 400, "body: {}", body);
        let error: Value = response.json().await.expect("Failed to parse JSON");
        assert!(error["error"]
            .as_str()
            .unwrap()
            .contains("Missing required fields"));
    }

    // Validation failures never reach the provider.
    assert_eq!(app.mock_provider.call_count(), 0);
}

#[tokio::test]
async fn depleted_account_is_rejected_before_the_provider_is_called() {
    let app = spawn_app().await;
    app.store.set_balance("broke", Decimal::ZERO).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", app.address))
        .json(&chat_body("broke"))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 402);
    let error: Value = response.json().await.expect("Failed to parse JSON");
    assert!(error["error"].as_str().unwrap().contains("Insufficient credits"));

    assert_eq!(app.mock_provider.call_count(), 0);
    assert!(app.store.list_usage("broke").await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_provider_is_rejected_before_streaming() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", app.address))
        .json(&json!({
            "messages": [{"role": "user", "content": "Hello"}],
            "provider": "skynet",
            "modelId": "test-model"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 500);
    let error: Value = response.json().await.expect("Failed to parse JSON");
    assert!(error["details"]
        .as_str()
        .unwrap()
        .contains("Unsupported AI provider"));
}

#[tokio::test]
async fn relays_chunks_in_order_and_settles_once() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", app.address))
        .json(&chat_body("alice"))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let body = response.text().await.expect("Failed to read stream");
    let payloads = sse_data_payloads(&body);

    assert_eq!(payloads.len(), 4);
    for (payload, expected) in payloads.iter().zip(["Mock", " streaming", " response"]) {
        let event: Value = serde_json::from_str(payload).expect("chunk event should be JSON");
        assert_eq!(event["content"], expected);
    }
    assert_eq!(payloads[3], "[DONE]");

    let generated = "Mock streaming response";
    let expected_tokens = estimate_tokens("Hello") + estimate_tokens(generated);
    let expected_cost = calculate_cost(expected_tokens, "test-model", Decimal::new(1, 2));

    let usage = app.store.list_usage("alice").await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].tokens_used, expected_tokens);
    assert_eq!(usage[0].cost, expected_cost);
    assert_eq!(usage[0].provider, "mock");
    assert_eq!(usage[0].model_id, "test-model");

    let account = app.store.get_account("alice").await.unwrap().unwrap();
    assert_eq!(account.balance, Decimal::new(10, 0) - expected_cost);

    // The persisted message carries exactly the accumulated stream.
    let message = app
        .store
        .find_message(usage[0].message_id)
        .await
        .expect("settlement message should exist");
    assert_eq!(message.content, generated);
    assert_eq!(message.sender_type, "agent");
}

#[tokio::test]
async fn omitted_account_id_falls_back_to_the_default_account() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", app.address))
        .json(&json!({
            "messages": [{"role": "user", "content": "Hello"}],
            "provider": "mock",
            "modelId": "test-model"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 200);
    response.text().await.expect("Failed to read stream");

    let account = app
        .store
        .get_account("default-account")
        .await
        .unwrap()
        .expect("default account should be auto-created");
    assert!(account.balance < Decimal::new(10, 0));
    assert_eq!(app.store.list_usage("default-account").await.unwrap().len(), 1);
}

#[tokio::test]
async fn upstream_rejection_becomes_one_in_band_error_event() {
    let mut server = mockito::Server::new_async().await;
    let upstream = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"message":"rate limited"}}"#)
        .create_async()
        .await;

    let provider = OpenRouterProvider::new(
        "test-key".to_string(),
        "http://localhost:3000".to_string(),
        "Relay Gateway".to_string(),
    )
    .with_base_url(server.url());
    let app = spawn_app_with(vec![Arc::new(provider)]).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", app.address))
        .json(&json!({
            "messages": [{"role": "user", "content": "Hello"}],
            "provider": "openrouter",
            "modelId": "some-model",
            "accountId": "bob"
        }))
        .send()
        .await
        .expect("Failed to send request");

    // The stream had already committed to 200; the failure is in-band.
    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.expect("Failed to read stream");
    let payloads = sse_data_payloads(&body);

    assert_eq!(payloads.len(), 2);
    let event: Value = serde_json::from_str(&payloads[0]).expect("error event should be JSON");
    assert!(event["error"].as_str().unwrap().contains("rate limited"));
    assert_eq!(payloads[1], "[DONE]");

    upstream.assert_async().await;

    // Nothing was generated, so only the input tokens are charged.
    let usage = app.store.list_usage("bob").await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].tokens_used, estimate_tokens("Hello"));
}

#[tokio::test]
async fn one_malformed_frame_does_not_break_the_stream() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {not json}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        ))
        .create_async()
        .await;

    let provider = OpenRouterProvider::new(
        "test-key".to_string(),
        "http://localhost:3000".to_string(),
        "Relay Gateway".to_string(),
    )
    .with_base_url(server.url());
    let app = spawn_app_with(vec![Arc::new(provider)]).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", app.address))
        .json(&json!({
            "messages": [{"role": "user", "content": "Hello"}],
            "provider": "openrouter",
            "modelId": "some-model",
            "accountId": "carol"
        }))
        .send()
        .await
        .expect("Failed to send request");

    let body = response.text().await.expect("Failed to read stream");
    let payloads = sse_data_payloads(&body);

    assert_eq!(payloads.len(), 3);
    let first: Value = serde_json::from_str(&payloads[0]).unwrap();
    let second: Value = serde_json::from_str(&payloads[1]).unwrap();
    assert_eq!(first["content"], "Hel");
    assert_eq!(second["content"], "lo");
    assert_eq!(payloads[2], "[DONE]");

    let usage = app.store.list_usage("carol").await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(
        usage[0].tokens_used,
        estimate_tokens("Hello") + estimate_tokens("Hello")
    );

    let message = app
        .store
        .find_message(usage[0].message_id)
        .await
        .expect("settlement message should exist");
    assert_eq!(message.content, "Hello");
}
