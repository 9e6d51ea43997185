//! The JSON-RPC endpoint on `/`: single requests, batches, and the endpoint
//! listing for browsers.

use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::Instrument;

use bftrpc_core::dispatch::handle_request;
use bftrpc_core::{
    ErrorCode, HttpRequestInfo, Origin, Registry, Request as RpcRequest, RequestId,
    Response as RpcResponse,
};

use super::error::AppError;
use super::{listing, new_trace_id, request_info, rpc_json, SharedState};

/// What the body decoded to: the reply shape mirrors the request shape.
enum Payload {
    Single(RpcRequest),
    Batch(Vec<RpcRequest>),
}

pub(super) async fn serve(State(state): State<SharedState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    if parts.uri.path() != "/" {
        return AppError::NotFound(format!("{} not found", parts.uri.path())).into_response();
    }

    let trace_id = new_trace_id();
    let span = tracing::info_span!("jsonrpc", trace_id = %trace_id);

    let body = match to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(err) => {
            let _guard = span.enter();
            tracing::debug!(error = %err, "failed to read request body");
            return rpc_json(&RpcResponse::error(
                RequestId::empty(),
                ErrorCode::InvalidRequest,
                format!("error reading request body: {err}"),
            ));
        }
    };

    if body.is_empty() {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        return listing::endpoint_listing(&state.registry, host);
    }

    let info = Arc::new(request_info(&parts));
    match respond(&state.registry, &info, &body).instrument(span).await {
        Reply::Single(response) => rpc_json(&response),
        Reply::Batch(responses) => rpc_json(&responses),
        Reply::Nothing => ().into_response(),
    }
}

enum Reply {
    Single(RpcResponse),
    Batch(Vec<RpcResponse>),
    Nothing,
}

async fn respond(registry: &Registry, info: &Arc<HttpRequestInfo>, body: &[u8]) -> Reply {
    let payload = match decode(body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(error = %err, "malformed json-rpc body");
            return Reply::Single(RpcResponse::parse_error(format!(
                "error unmarshaling request: {err}"
            )));
        }
    };

    match payload {
        Payload::Single(request) => match serve_one(registry, info, request).await {
            Some(response) => Reply::Single(response),
            None => Reply::Nothing,
        },
        Payload::Batch(requests) => {
            let mut responses = Vec::with_capacity(requests.len());
            for request in requests {
                if let Some(response) = serve_one(registry, info, request).await {
                    responses.push(response);
                }
            }
            if responses.is_empty() {
                Reply::Nothing
            } else {
                Reply::Batch(responses)
            }
        }
    }
}

/// An array is a batch; anything else must be a single request object.
fn decode(body: &[u8]) -> Result<Payload, serde_json::Error> {
    match serde_json::from_slice::<Vec<RpcRequest>>(body) {
        Ok(requests) => Ok(Payload::Batch(requests)),
        Err(_) => serde_json::from_slice::<RpcRequest>(body).map(Payload::Single),
    }
}

async fn serve_one(
    registry: &Registry,
    info: &Arc<HttpRequestInfo>,
    request: RpcRequest,
) -> Option<RpcResponse> {
    if request.is_notification() {
        tracing::debug!(
            rpc.method = %request.method,
            "received a notification, skipping (send a non-empty id to call a method)"
        );
        return None;
    }
    if info.path.len() > 1 {
        return Some(RpcResponse::error(
            request.id,
            ErrorCode::InvalidRequest,
            format!("path {} is invalid", info.path),
        ));
    }
    handle_request(registry, request, Origin::Http(Arc::clone(info))).await
}
