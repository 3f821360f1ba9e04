#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use reqwest::Client;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use uuid::Uuid;

use loom_sync::config::{CacheConfig, Config, SyncConfig};
use loom_sync::db;
use loom_sync::models::QueuedAction;
use loom_sync::state::SharedState;

pub const TEST_TOKEN: &str = "test-token";

// ── Fake Loom backend ───────────────────────────────────────────

/// A request as seen by the fake backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct BackendState {
    requests: Mutex<Vec<RecordedRequest>>,
    scripted: Mutex<VecDeque<u16>>,
    delay_ms: AtomicU64,
}

/// Records every request and answers with scripted statuses (200 once the script runs out).
pub struct FakeBackend {
    pub addr: SocketAddr,
    state: Arc<BackendState>,
}

impl FakeBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    /// Queue statuses for the next requests, in order.
    pub fn respond_with(&self, statuses: &[u16]) {
        self.state.scripted.lock().unwrap().extend(statuses.iter().copied());
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

pub async fn spawn_backend() -> FakeBackend {
    let state = Arc::new(BackendState::default());

    let app = Router::new()
        .route("/health", axum::routing::get(|| async { Json(json!({ "ok": true })) }))
        .fallback(record)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind backend");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Backend failed");
    });

    FakeBackend { addr, state }
}

async fn record(State(state): State<Arc<BackendState>>, req: Request) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let (authorization, content_type) = {
        let header_str = |name: header::HeaderName| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        (
            header_str(header::AUTHORIZATION),
            header_str(header::CONTENT_TYPE),
        )
    };

    let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).ok();

    let n = {
        let mut requests = state.requests.lock().unwrap();
        requests.push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            authorization,
            content_type,
            body,
        });
        requests.len()
    };

    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let status = state.scripted.lock().unwrap().pop_front().unwrap_or(200);
    let status = StatusCode::from_u16(status).unwrap();

    if path == "/api/legacy-headers" {
        let mut resp = (status, Json(json!({ "path": path }))).into_response();
        let headers = resp.headers_mut();
        headers.insert("x-label", HeaderValue::from_str("café").unwrap());
        headers.insert("x-latin1", HeaderValue::from_bytes(b"caf\xe9").unwrap());
        return resp;
    }

    if method == "GET" && !path.starts_with("/api/") {
        let content_type = if path.ends_with(".js") {
            "application/javascript"
        } else {
            "text/html"
        };
        return (
            status,
            [(header::CONTENT_TYPE, content_type)],
            format!("<html>{path}</html>"),
        )
            .into_response();
    }

    (status, Json(json!({ "path": path, "method": method, "n": n }))).into_response()
}

/// A URL nothing listens on: every request fails at the transport level.
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

// ── Agent ───────────────────────────────────────────────────────

pub fn test_config(upstream_url: &str) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        upstream_url: upstream_url.to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        api_token: Some(TEST_TOKEN.to_string()),
        default_max_retries: 3,
        sync: SyncConfig {
            interval: None,
            probe_interval: None,
            request_timeout: Duration::from_secs(5),
            on_enqueue: false,
            ..SyncConfig::default()
        },
        cache: CacheConfig::default(),
        max_body_size: 1_048_576,
        log_level: "warn".to_string(),
    }
}

/// Agent state over a fresh in-memory store, without an HTTP listener.
pub async fn agent(upstream_url: &str) -> SharedState {
    agent_with(test_config(upstream_url)).await
}

pub async fn agent_with(config: Config) -> SharedState {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory store");
    let (_app, state) = loom_sync::build_app(pool, config).expect("Failed to build app");
    state
}

/// A running agent with its control API on a random port.
pub struct TestAgent {
    pub addr: SocketAddr,
    pub state: SharedState,
    pub client: Client,
}

impl TestAgent {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn enqueue(&self, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/loom/v1/queue"))
            .json(body)
            .send()
            .await
            .expect("enqueue request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get_json(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

pub async fn spawn_agent(config: Config) -> TestAgent {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory store");
    let (app, state) = loom_sync::build_app(pool, config).expect("Failed to build app");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestAgent {
        addr,
        state,
        client,
    }
}

// ── Store helpers ───────────────────────────────────────────────

pub fn action(action_type: &str, event_id: &str, data: Value, timestamp: i64, max_retries: i32) -> QueuedAction {
    QueuedAction {
        id: Uuid::now_v7(),
        action_type: action_type.to_string(),
        event_id: event_id.to_string(),
        data,
        timestamp,
        retry_count: 0,
        max_retries,
    }
}

pub async fn insert(pool: &SqlitePool, action: &QueuedAction) {
    db::action_queue::insert(pool, action)
        .await
        .expect("insert failed");
}

/// Poll until `check` holds or the timeout elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
