// tests/common/mod.rs

#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use nucleus::{config::Config, db, routes, state::AppState};
use serde_json::{Value, json};
use sqlx::SqlitePool;

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
    pub db_path: PathBuf,
}

/// The database file and its WAL companions.
pub fn db_files(path: &Path) -> Vec<PathBuf> {
    ["", "-wal", "-shm"]
        .iter()
        .map(|suffix| PathBuf::from(format!("{}{}", path.display(), suffix)))
        .collect()
}

impl Drop for TestApp {
    fn drop(&mut self) {
        for file in db_files(&self.db_path) {
            let _ = std::fs::remove_file(file);
        }
    }
}

pub const PASSWORD: &str = "password123";
pub const OPENAI_TEST_KEY: &str = "sk-test";

/// Nothing listens on the discard port.
pub const DEAD_URL: &str = "http://127.0.0.1:9";

pub fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        log_dir: "logs".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        cors_origins: vec!["http://localhost:3000".to_string()],
        admin_username: None,
        admin_password: None,
        ollama_base_url: DEAD_URL.to_string(),
        ollama_health_timeout_ms: 1500,
        openai_api_key: None,
        openai_base_url: DEAD_URL.to_string(),
        mistral_api_key: None,
        mistral_base_url: DEAD_URL.to_string(),
        llm_request_timeout_secs: 5,
        signup_credits: 50,
        chat_credit_cost: 1,
        roundrobin_turn_cost: 1,
        roundrobin_context_chars: 12_000,
        roundrobin_attempt_timeout_secs: 5,
    }
}

/// Spawns the app on a random port with its own SQLite file.
pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let path = std::env::temp_dir().join(format!("nucleus-test-{}.db", uuid::Uuid::new_v4()));
    let mut config = test_config(format!("sqlite://{}", path.display()));
    configure(&mut config);

    let pool = db::connect(&config.database_url, 5)
        .await
        .expect("Failed to open test database");
    db::migrate(&pool).await.expect("Failed to migrate database");

    let state = AppState::new(pool.clone(), config).expect("Failed to build state");
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client: reqwest::Client::new(),
        db_path: path,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// App wired to a mock server that plays both Ollama and OpenAI.
pub async fn spawn_app_with_llm() -> TestApp {
    let upstream = spawn_mock_llm().await;
    spawn_app_with(|c| {
        c.ollama_base_url = upstream.clone();
        c.openai_base_url = format!("{}/v1", upstream);
        c.openai_api_key = Some(OPENAI_TEST_KEY.to_string());
    })
    .await
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn unique_name(prefix: &str) -> String {
        format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
    }

    /// Registers a fresh user and returns (user id, bearer token).
    pub async fn signup(&self, prefix: &str) -> (i64, String) {
        let username = Self::unique_name(prefix);
        let user: Value = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .expect("Register failed")
            .json()
            .await
            .unwrap();
        let id = user["id"].as_i64().expect("No user id");

        (id, self.login(&username).await)
    }

    pub async fn login(&self, username: &str) -> String {
        let body: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .expect("Login failed")
            .json()
            .await
            .unwrap();
        body["token"].as_str().expect("Token not found").to_string()
    }

    /// Registers a user, promotes it, and logs in again so the token carries the role.
    pub async fn signup_admin(&self) -> (i64, String) {
        let username = Self::unique_name("admin");
        let user: Value = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        sqlx::query("UPDATE users SET role = 'admin' WHERE username = ?")
            .bind(&username)
            .execute(&self.pool)
            .await
            .unwrap();

        (user["id"].as_i64().unwrap(), self.login(&username).await)
    }

    pub async fn balance(&self, token: &str) -> i64 {
        let body: Value = self
            .client
            .get(self.url("/api/nucleus/credits"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["balance"].as_i64().expect("No balance")
    }
}

// ---------------------------------------------------------------------------
// Mock upstream
// ---------------------------------------------------------------------------

/// Model name that makes every mock endpoint answer 500.
pub const BROKEN_MODEL: &str = "broken";

/// Model name the mock Ollama answers only after two seconds.
pub const SLOW_MODEL: &str = "slow";

fn message_count(body: &Value) -> usize {
    body["messages"].as_array().map(|m| m.len()).unwrap_or(0)
}

async fn ollama_chat(Json(body): Json<Value>) -> Response {
    let model = body["model"].as_str().unwrap_or_default().to_string();
    if model == BROKEN_MODEL {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response();
    }
    if model == SLOW_MODEL {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    Json(json!({
        "model": model,
        "message": {
            "role": "assistant",
            "content": format!("{} says hi ({} msgs)", model, message_count(&body)),
        },
        "done": true,
        "prompt_eval_count": 3,
        "eval_count": 5,
    }))
    .into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", OPENAI_TEST_KEY);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str())
}

async fn openai_models(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "object": "list",
        "data": [
            { "id": "gpt-4o-mini", "object": "model" },
            { "id": "gpt-4o", "object": "model" },
        ],
    }))
    .into_response()
}

async fn openai_chat(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let model = body["model"].as_str().unwrap_or_default().to_string();
    if model == BROKEN_MODEL {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response();
    }
    Json(json!({
        "id": "chatcmpl-1",
        "model": model,
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": format!("{} answers ({} msgs)", model, message_count(&body)),
            },
            "finish_reason": "stop",
        }],
        "usage": { "prompt_tokens": 7, "completion_tokens": 2 },
    }))
    .into_response()
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    address
}

/// Ollama under `/api/*`, OpenAI under `/v1/*`. Returns the base URL.
pub async fn spawn_mock_llm() -> String {
    let router = Router::new()
        .route("/api/version", get(|| async { Json(json!({ "version": "0.5.1" })) }))
        .route(
            "/api/tags",
            get(|| async {
                Json(json!({ "models": [{ "name": "mistral:7b" }, { "name": "llama3:8b" }] }))
            }),
        )
        .route("/api/chat", post(ollama_chat))
        .route("/v1/models", get(openai_models))
        .route("/v1/chat/completions", post(openai_chat));
    serve(router).await
}

/// An Ollama that answers the version check only after `delay`.
pub async fn spawn_slow_ollama(delay: Duration) -> String {
    let router = Router::new().route(
        "/api/version",
        get(move || async move {
            tokio::time::sleep(delay).await;
            Json(json!({ "version": "0.5.1" }))
        }),
    );
    serve(router).await
}

/// An Ollama that is up but failing.
pub async fn spawn_failing_ollama() -> String {
    let router = Router::new().route(
        "/api/version",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    serve(router).await
}
