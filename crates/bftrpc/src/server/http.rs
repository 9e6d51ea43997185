use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Form, FromRequest, Query, Request};
use axum::http::{header, request::Parts, Method};
use axum::response::Response;
use tracing::Instrument;

use bftrpc_core::binder::bind_query_params;
use bftrpc_core::dispatch::invoke;
use bftrpc_core::{CallContext, ErrorCode, Origin, RequestId, Response as RpcResponse};

use super::{new_trace_id, request_info, rpc_json, SharedState};

/// `GET|POST /<name>?arg=value&...`: arguments come from the query string
/// and, for urlencoded form posts, from the body as well (body fields win).
/// The reply is one envelope with an empty id.
pub(super) async fn call_method(state: SharedState, name: &str, request: Request) -> Response {
    let trace_id = new_trace_id();
    let span = tracing::info_span!("http_call", trace_id = %trace_id, rpc.method = name);

    let response = async {
        let descriptor = match state.registry.lookup(name) {
            Some(descriptor) if !descriptor.websocket_only() => descriptor,
            _ => {
                tracing::debug!("method is not callable over http");
                return RpcResponse::method_not_found(RequestId::empty());
            }
        };

        let (parts, body) = request.into_parts();
        let info = Arc::new(request_info(&parts));
        let params = match form_values(&parts, body, state.max_body_bytes).await {
            Ok(params) => params,
            Err(response) => return response,
        };

        let args = match bind_query_params(descriptor, &params) {
            Ok(args) => args,
            Err(err) => {
                tracing::debug!(error = %err, "invalid query params");
                return RpcResponse::error(
                    RequestId::empty(),
                    ErrorCode::InvalidParams,
                    format!("error converting http params to arguments: {err}"),
                );
            }
        };

        invoke(
            descriptor,
            RequestId::empty(),
            CallContext::new(None, Origin::Http(info)),
            args,
        )
        .await
    }
    .instrument(span)
    .await;

    rpc_json(&response)
}

/// Query-string values, overlaid with the fields of an urlencoded POST body.
async fn form_values(
    parts: &Parts,
    body: Body,
    max_body_bytes: usize,
) -> Result<HashMap<String, String>, RpcResponse> {
    let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map_err(|err| {
            RpcResponse::error(
                RequestId::empty(),
                ErrorCode::InvalidParams,
                format!("error parsing query string: {err}"),
            )
        })?;

    if !is_form_post(parts) {
        return Ok(params);
    }

    let bytes = to_bytes(body, max_body_bytes).await.map_err(|err| {
        tracing::debug!(error = %err, "failed to read form body");
        RpcResponse::error(
            RequestId::empty(),
            ErrorCode::InvalidRequest,
            format!("error reading request body: {err}"),
        )
    })?;

    let mut form_request = Request::new(Body::from(bytes));
    *form_request.method_mut() = Method::POST;
    form_request.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    let Form(fields) = Form::<HashMap<String, String>>::from_request(form_request, &())
        .await
        .map_err(|err| {
            RpcResponse::error(
                RequestId::empty(),
                ErrorCode::InvalidParams,
                format!("error parsing form body: {err}"),
            )
        })?;

    params.extend(fields);
    Ok(params)
}

fn is_form_post(parts: &Parts) -> bool {
    parts.method == Method::POST
        && parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}
