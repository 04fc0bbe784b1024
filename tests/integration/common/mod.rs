//! Shared harness: a mock scoring oracle and a running GateCode server.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use gatecode_core::{create_router, AppState, Config, HttpOracle, Problem};
use serde_json::{json, Value};

/// A comfortably long explanation.
pub const GOOD_EXPLANATION: &str =
    "Walk the array once while keeping a hash map from each value to its index. For every number, \
     look up target minus that number in the map; if it is there, return both indices, otherwise \
     insert the current number and keep going.";

/// Path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

/// What the mock oracle answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A well-formed assessment with this score, wrapped in a code fence.
    Score(u8),
    /// Raw answer text.
    Text(String),
    /// An HTTP error status.
    Status(u16),
}

/// Mock of a Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct MockOracle {
    reply: Arc<Mutex<MockReply>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    api_keys: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockOracle {
    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// API keys sent with each request.
    pub fn api_keys(&self) -> Vec<String> {
        self.api_keys.lock().expect("lock poisoned").clone()
    }

    /// Prompts received.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock poisoned").clone()
    }

    /// Changes the reply for subsequent requests.
    pub fn set_reply(&self, reply: MockReply) {
        *self.reply.lock().expect("lock poisoned") = reply;
    }
}

async fn handle_generate(
    State(mock): State<MockOracle>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    mock.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(key) = headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) {
        mock.api_keys.lock().expect("lock poisoned").push(key.to_string());
    }
    if let Some(prompt) = body
        .pointer("/contents/0/parts/0/text")
        .and_then(Value::as_str)
    {
        mock.prompts.lock().expect("lock poisoned").push(prompt.to_string());
    }

    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }

    let reply = mock.reply.lock().expect("lock poisoned").clone();
    let text = match reply {
        MockReply::Score(score) => format!(
            "```json\n{}\n```",
            json!({
                "score": score,
                "feedback": format!("Scored {score}"),
                "reasoning": "Mock assessment",
                "missingConcepts": ["duplicates"],
            })
        ),
        MockReply::Text(text) => text,
        MockReply::Status(status) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, "mock failure").into_response();
        }
    };

    Json(json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    }))
    .into_response()
}

/// Starts a mock oracle and returns its endpoint URL.
pub async fn spawn_mock_oracle(reply: MockReply, delay: Duration) -> (String, MockOracle) {
    let mock = MockOracle {
        reply: Arc::new(Mutex::new(reply)),
        delay,
        calls: Arc::new(AtomicUsize::new(0)),
        api_keys: Arc::new(Mutex::new(Vec::new())),
        prompts: Arc::new(Mutex::new(Vec::new())),
    };

    let router = Router::new()
        .route("/generate", post(handle_generate))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock oracle");
    let addr = listener.local_addr().expect("Failed to get local addr");
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Mock oracle failed");
    });

    (
        format!("http://{addr}/generate"),
        mock,
    )
}

/// An endpoint nothing listens on.
pub async fn unreachable_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");
    drop(listener);
    format!("http://{addr}/score")
}

/// Config loaded from the fixtures, pointed at `endpoint`.
pub fn test_config(endpoint: &str) -> Config {
    let mut config =
        Config::load_from_file(&fixture_path("gatecode.json")).expect("Failed to load config");
    config.problem = fixture_path("problem.json").display().to_string();
    config.oracle.endpoint = Some(endpoint.to_string());
    config
}

/// Starts GateCode against `endpoint` and returns its base URL.
pub async fn spawn_app(endpoint: &str) -> String {
    let config = test_config(endpoint);
    let problem = Problem::load(&config.problem).expect("Failed to load problem");
    let oracle = HttpOracle::with_api_key(&config.oracle, "test-key").expect("Failed to build oracle");
    let state = AppState::build(config, problem, Arc::new(oracle)).expect("Failed to build state");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let router = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    format!("http://{addr}")
}

/// Minimal JSON client for the session API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn ws_url(&self) -> String {
        format!("{}/ws", self.base.replacen("http", "ws", 1))
    }

    pub async fn get(&self, path: &str) -> (u16, Value) {
        let response = self
            .http
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .expect("Request failed");
        Self::decode(response).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> (u16, Value) {
        let mut request = self.http.post(format!("{}{path}", self.base));
        if let Some(body) = body {
            request = request.json(&body);
        }
        Self::decode(request.send().await.expect("Request failed")).await
    }

    pub async fn put(&self, path: &str, body: Value) -> (u16, Value) {
        let response = self
            .http
            .put(format!("{}{path}", self.base))
            .json(&body)
            .send()
            .await
            .expect("Request failed");
        Self::decode(response).await
    }

    pub async fn submit(&self, text: &str) -> (u16, Value) {
        self.post("/api/session/explanation", Some(json!({ "text": text })))
            .await
    }

    async fn decode(response: reqwest::Response) -> (u16, Value) {
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }
}
