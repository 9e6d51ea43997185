//! Invocation of registered functions and the shared per-request pipeline.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::binder::bind_json_params;
use crate::context::{CallContext, Origin};
use crate::error::{CallError, ErrorCode};
use crate::registry::{BoundArgs, FunctionDescriptor, Registry};
use crate::types::{Request, RequestId, Response};

/// Call the function behind `descriptor` and wrap the outcome in an envelope
/// carrying `id`. Handler errors and panics become `InternalError` failures,
/// whichever transport the call arrived on.
pub async fn invoke(
    descriptor: &FunctionDescriptor,
    id: RequestId,
    ctx: CallContext,
    args: BoundArgs,
) -> Response {
    let called = AssertUnwindSafe(descriptor.handler().call(ctx, args))
        .catch_unwind()
        .await;
    let outcome = match called {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(rpc.method = descriptor.name(), rpc.id = %id, panic = %message, "panic while serving rpc call");
            return Response::error(
                id,
                ErrorCode::InternalError,
                format!("panic while serving request: {message}"),
            );
        }
    };

    match outcome {
        Ok(result) => {
            info!(rpc.method = descriptor.name(), rpc.id = %id, "rpc call succeeded");
            Response::success(id, result)
        }
        Err(err) => {
            if matches!(err, CallError::ArgumentShape | CallError::Encode(_)) {
                warn!(rpc.method = descriptor.name(), rpc.id = %id, error = %err, "rpc call failed");
            } else {
                info!(rpc.method = descriptor.name(), rpc.id = %id, error = %err, "rpc call returned error");
            }
            Response::error(id, ErrorCode::InternalError, err)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Serve one JSON-RPC request arriving from `origin`.
///
/// Returns `None` for notifications, which never get a response.
pub async fn handle_request(
    registry: &Registry,
    request: Request,
    origin: Origin,
) -> Option<Response> {
    if request.is_notification() {
        debug!(
            rpc.method = %request.method,
            "received a notification, skipping (send a non-empty id to call a method)"
        );
        return None;
    }

    let id = request.id.clone();
    let over_http = matches!(origin, Origin::Http(_));
    let descriptor = match registry.lookup(&request.method) {
        Some(descriptor) if !(over_http && descriptor.websocket_only()) => descriptor,
        _ => {
            debug!(rpc.method = %request.method, rpc.id = %id, "method not found");
            return Some(Response::method_not_found(id));
        }
    };

    let args = match bind_json_params(descriptor, &request.params) {
        Ok(args) => args,
        Err(err) => {
            debug!(rpc.method = %request.method, rpc.id = %id, error = %err, "invalid params");
            return Some(Response::error(
                id,
                ErrorCode::InvalidParams,
                format!("error converting json params to arguments: {err}"),
            ));
        }
    };

    let ctx = CallContext::new(Some(request), origin);
    Some(invoke(descriptor, id, ctx, args).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{http_origin, test_registry};
    use serde_json::{json, Value};

    fn request(id: &str, method: &str, params: Value) -> Request {
        Request::new(id, method, params)
    }

    #[tokio::test]
    async fn echo_round_trips_byte_for_byte() {
        let registry = test_registry();
        let response = handle_request(&registry, request("1", "echo", json!(["hi"])), http_origin())
            .await
            .expect("response");
        assert_eq!(response, Response::success("1".into(), json!("hi")));
    }

    #[tokio::test]
    async fn notifications_produce_nothing() {
        let registry = test_registry();
        let response =
            handle_request(&registry, request("", "echo", json!(["hi"])), http_origin()).await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn unknown_methods_keep_the_original_id() {
        let registry = test_registry();
        let response = handle_request(&registry, request("xyz-9", "nope", Value::Null), http_origin())
            .await
            .expect("response");
        assert_eq!(response.error_code(), Some(ErrorCode::MethodNotFound));
        assert_eq!(response.id(), &RequestId::from("xyz-9"));
    }

    #[tokio::test]
    async fn websocket_only_methods_are_hidden_from_http() {
        let registry = test_registry();
        let response = handle_request(&registry, request("1", "ws_only", Value::Null), http_origin())
            .await
            .expect("response");
        assert_eq!(response.error_code(), Some(ErrorCode::MethodNotFound));
    }

    #[tokio::test]
    async fn bind_failures_are_invalid_params() {
        let registry = test_registry();
        let response = handle_request(&registry, request("2", "echo", json!([1, 2])), http_origin())
            .await
            .expect("response");
        assert_eq!(response.error_code(), Some(ErrorCode::InvalidParams));
        assert_eq!(response.id(), &RequestId::from("2"));
    }

    #[tokio::test]
    async fn handler_errors_are_internal_errors() {
        let registry = test_registry();
        let response = handle_request(&registry, request("3", "fail", json!(["boom"])), http_origin())
            .await
            .expect("response");
        match response {
            Response::Failure { id, error } => {
                assert_eq!(id, RequestId::from("3"));
                assert_eq!(error.kind(), Some(ErrorCode::InternalError));
                assert_eq!(error.data, "boom");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handler_panics_are_internal_errors_with_the_request_id() {
        let registry = test_registry();
        let response =
            handle_request(&registry, request("6", "explode", json!(["kaboom"])), http_origin())
                .await
                .expect("response");
        match response {
            Response::Failure { id, error } => {
                assert_eq!(id, RequestId::from("6"));
                assert_eq!(error.kind(), Some(ErrorCode::InternalError));
                assert!(error.data.contains("kaboom"));
            }
            other => panic!("expected failure, got {other:?}"),
        }

        let after = handle_request(&registry, request("7", "echo", json!(["ok"])), http_origin())
            .await
            .expect("response");
        assert_eq!(after, Response::success("7".into(), json!("ok")));
    }

    #[tokio::test]
    async fn interface_results_keep_their_type_tag() {
        let registry = test_registry();
        let response = handle_request(&registry, request("4", "variant", Value::Null), http_origin())
            .await
            .expect("response");
        assert_eq!(
            response,
            Response::success(
                "4".into(),
                json!({"@type": "/test.Variant", "value": {"n": 1}})
            )
        );
    }

    #[tokio::test]
    async fn handlers_see_the_json_request_in_their_context() {
        let registry = test_registry();
        let response = handle_request(&registry, request("5", "whoami", Value::Null), http_origin())
            .await
            .expect("response");
        assert_eq!(response, Response::success("5".into(), json!("whoami")));
    }
}
