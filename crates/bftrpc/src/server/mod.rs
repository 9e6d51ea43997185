mod error;
mod http;
mod jsonrpc;
mod listing;
mod websocket;

pub use websocket::WebsocketManager;

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, request::Parts, Extensions};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use rand::Rng;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use bftrpc_core::{HttpRequestInfo, Registry};

use error::AppError;

/// Largest request body accepted on any endpoint.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_000_000;

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub registry: Arc<Registry>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

/// One route per registered method, the WebSocket endpoint if a manager is
/// given, and the JSON-RPC endpoint on `/` as the fallback.
pub fn build_router(state: AppState, websocket: Option<(&str, WebsocketManager)>) -> Router {
    let shared = Arc::new(state);
    let mut router = Router::new();

    for descriptor in shared.registry.iter() {
        let name: Arc<str> = Arc::from(descriptor.name());
        let path = format!("/{name}");
        router = router.route(
            &path,
            any(move |State(state): State<SharedState>, request: Request| {
                let name = Arc::clone(&name);
                async move { http::call_method(state, &name, request).await }
            }),
        );
    }

    if let Some((path, manager)) = websocket {
        let manager = Arc::new(manager);
        router = router.route(
            path,
            get(move |upgrade: WebSocketUpgrade, extensions: Extensions| {
                let manager = Arc::clone(&manager);
                let remote = extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map_or_else(|| "unknown".to_owned(), |ConnectInfo(addr)| addr.to_string());
                async move { manager.accept(upgrade, remote) }
            }),
        );
    }

    router
        .fallback(jsonrpc::serve)
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Browsers calling from other origins are let through unconditionally.
pub fn permissive_cors() -> CorsLayer {
    CorsLayer::permissive()
}

// ==============================================================================
// Shared Helpers
// ==============================================================================

fn new_trace_id() -> String {
    let id: u64 = rand::thread_rng().gen();
    format!("{id:016x}")
}

fn request_info(parts: &Parts) -> HttpRequestInfo {
    let headers: BTreeMap<String, String> = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_owned(), value.to_owned()))
        })
        .collect();

    HttpRequestInfo {
        method: parts.method.to_string(),
        path: parts.uri.path().to_owned(),
        query: parts.uri.query().map(str::to_owned),
        headers,
        remote_addr: parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string()),
    }
}

/// Indented JSON with status 200, the way every RPC outcome is written.
fn rpc_json<T: Serialize>(body: &T) -> Response {
    match serde_json::to_vec_pretty(body) {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode rpc response");
            AppError::Internal(format!("failed to encode response: {err}")).into_response()
        }
    }
}
