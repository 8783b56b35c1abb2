// tests/provider_tests.rs

mod common;

use std::time::{Duration, Instant};

use common::{
    DEAD_URL, spawn_app, spawn_app_with, spawn_app_with_llm, spawn_failing_ollama,
    spawn_mock_llm, spawn_slow_ollama,
};
use serde_json::{Value, json};

async fn get_json(app: &common::TestApp, path: &str) -> (u16, Value) {
    let response = app.client.get(app.url(path)).send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn ollama_health_reports_version_when_online() {
    let app = spawn_app_with_llm().await;

    let (status, body) = get_json(&app, "/api/ollama/health").await;

    assert_eq!(status, 200);
    assert_eq!(body["online"], true);
    assert_eq!(body["version"], "0.5.1");
    assert!(body["baseUrl"].as_str().unwrap().starts_with("http://127.0.0.1:"));
}

#[tokio::test]
async fn ollama_health_is_offline_when_unreachable() {
    let app = spawn_app().await;

    let (status, body) = get_json(&app, "/api/ollama/health").await;

    assert_eq!(status, 200);
    assert_eq!(body["online"], false);
    assert_eq!(body["baseUrl"], DEAD_URL);
    assert!(body.get("version").is_none());
}

#[tokio::test]
async fn ollama_health_is_offline_when_failing() {
    let upstream = spawn_failing_ollama().await;
    let app = spawn_app_with(|c| c.ollama_base_url = upstream).await;

    let (status, body) = get_json(&app, "/api/ollama/health").await;

    assert_eq!(status, 200);
    assert_eq!(body["online"], false);
}

#[tokio::test]
async fn ollama_health_gives_up_after_its_timeout() {
    let upstream = spawn_slow_ollama(Duration::from_secs(5)).await;
    let app = spawn_app_with(|c| {
        c.ollama_base_url = upstream;
        c.ollama_health_timeout_ms = 200;
    })
    .await;

    let started = Instant::now();
    let (status, body) = get_json(&app, "/api/ollama/health").await;

    assert_eq!(status, 200);
    assert_eq!(body["online"], false);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn openai_models_are_sorted() {
    let app = spawn_app_with_llm().await;

    let (status, body) = get_json(&app, "/api/openai/models").await;

    assert_eq!(status, 200);
    assert_eq!(body, json!({ "models": ["gpt-4o", "gpt-4o-mini"] }));
}

#[tokio::test]
async fn openai_models_are_empty_without_a_key() {
    let upstream = spawn_mock_llm().await;
    let app = spawn_app_with(|c| c.openai_base_url = format!("{}/v1", upstream)).await;

    let (status, body) = get_json(&app, "/api/openai/models").await;

    assert_eq!(status, 200);
    assert_eq!(body, json!({ "models": [] }));
}

#[tokio::test]
async fn openai_models_are_empty_when_upstream_rejects_the_key() {
    let upstream = spawn_mock_llm().await;
    let app = spawn_app_with(|c| {
        c.openai_base_url = format!("{}/v1", upstream);
        c.openai_api_key = Some("sk-wrong".to_string());
    })
    .await;

    let (status, body) = get_json(&app, "/api/openai/models").await;

    assert_eq!(status, 200);
    assert_eq!(body, json!({ "models": [] }));
}

#[tokio::test]
async fn ollama_models_come_from_tags() {
    let app = spawn_app_with_llm().await;

    let (status, body) = get_json(&app, "/api/ollama/models").await;

    assert_eq!(status, 200);
    assert_eq!(body, json!({ "models": ["llama3:8b", "mistral:7b"] }));
}

#[tokio::test]
async fn all_models_groups_by_provider() {
    let app = spawn_app_with_llm().await;

    let (status, body) = get_json(&app, "/api/models").await;

    assert_eq!(status, 200);
    assert_eq!(body["providers"]["ollama"], json!(["llama3:8b", "mistral:7b"]));
    assert_eq!(body["providers"]["openai"], json!(["gpt-4o", "gpt-4o-mini"]));
    // Mistral has no key and no reachable server.
    assert_eq!(body["providers"]["mistral"], json!([]));
}

#[tokio::test]
async fn ollama_chat_requires_auth() {
    let app = spawn_app_with_llm().await;

    let response = app
        .client
        .post(app.url("/api/ollama/chat"))
        .json(&json!({ "model": "llama3:8b", "messages": [{ "role": "user", "content": "hi" }] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn ollama_chat_is_not_billed() {
    let app = spawn_app_with_llm().await;
    let (_, token) = app.signup("local").await;

    let response = app
        .client
        .post(app.url("/api/ollama/chat"))
        .bearer_auth(&token)
        .json(&json!({ "model": "llama3:8b", "messages": [{ "role": "user", "content": "hi" }] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["model"], "llama3:8b");
    assert_eq!(body["content"], "llama3:8b says hi (1 msgs)");
    assert_eq!(app.balance(&token).await, 50);
}

#[tokio::test]
async fn ollama_chat_against_a_dead_daemon_is_502() {
    let app = spawn_app().await;
    let (_, token) = app.signup("local").await;

    let response = app
        .client
        .post(app.url("/api/ollama/chat"))
        .bearer_auth(&token)
        .json(&json!({ "model": "llama3:8b", "messages": [{ "role": "user", "content": "hi" }] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 502);
}
