//! In-process stand-in for the task backend, used by async tests.
//!
//! Every request is recorded. Responses are canned per path and default to
//! `200 {}`. `/get_ui_state` can be slowed down and tracks how many requests
//! are in flight at once.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Value,
    pub raw: String,
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<Call>>,
    responses: Mutex<HashMap<String, (u16, Value)>>,
    poll_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub struct MockBackend {
    pub base_url: String,
    shared: Arc<Shared>,
    server: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let shared = Arc::new(Shared::default());
        let app = Router::new().fallback(handle).with_state(shared.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            base_url: format!("http://{addr}"),
            shared,
            server,
        }
    }

    pub fn respond(&self, path: &str, status: u16, body: Value) {
        self.shared
            .responses
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body));
    }

    pub fn set_poll_delay(&self, delay: Duration) {
        *self.shared.poll_delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.path).collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.calls().iter().filter(|c| c.path == path).count()
    }

    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let raw = String::from_utf8_lossy(&body).to_string();
    let path = uri.path().to_string();
    shared.calls.lock().unwrap().push(Call {
        method,
        path: path.clone(),
        query: uri.query().map(String::from),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        raw,
    });

    if path == "/get_ui_state" {
        let now = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        shared.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *shared.poll_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    let canned = shared.responses.lock().unwrap().get(&path).cloned();
    let (status, value) = canned.unwrap_or((200, Value::Object(Default::default())));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(value)).into_response()
}
