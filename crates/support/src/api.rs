use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::IntoResponse;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: String,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct ApiState {
    /// Scripted replies per `METHOD path`; the last one repeats.
    routes: HashMap<String, Vec<(u16, String)>>,
    hits: HashMap<String, usize>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<ApiState>>;

fn route_key(method: &str, path: &str) -> String {
    format!("{} {path}", method.to_ascii_uppercase())
}

/// Scripted management API on `127.0.0.1:<random>`.
///
/// Each route answers with its scripted replies in order, repeating the last
/// one. Unscripted routes answer 404.
pub struct MockApi {
    addr: SocketAddr,
    state: Shared,
    handle: JoinHandle<()>,
}

impl MockApi {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(ApiState::default()));
        let router = Router::new().fallback(handle).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Self { addr, state, handle }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Append a reply to the route's script.
    pub fn on(&self, method: &str, path: &str, status: u16, body: &str) -> &Self {
        self.state
            .lock()
            .routes
            .entry(route_key(method, path))
            .or_default()
            .push((status, body.to_owned()));
        self
    }

    pub fn on_json(&self, method: &str, path: &str, status: u16, body: Value) -> &Self {
        self.on(method, path, status, &body.to_string())
    }

    pub fn hits(&self, method: &str, path: &str) -> usize {
        self.state.lock().hits.get(&route_key(method, path)).copied().unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let path = uri.path().to_owned();
    let key = route_key(method.as_str(), &path);
    let mut state = state.lock();
    state.requests.push(RecordedRequest {
        method: method.as_str().to_owned(),
        path,
        query: uri.query().map(str::to_owned),
        body,
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    });
    let hit = {
        let count = state.hits.entry(key.clone()).or_insert(0);
        *count += 1;
        *count
    };
    let (status, body) = match state.routes.get(&key) {
        Some(script) if !script.is_empty() => script[(hit - 1).min(script.len() - 1)].clone(),
        _ => (404, r#"{"messages":[{"type":"ERROR","text":"Not Found"}]}"#.to_owned()),
    };
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}
