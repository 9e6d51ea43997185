use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

// ==============================================================================
// Error Type
// ==============================================================================

/// Transport-level outcomes. Protocol errors never use this; they travel as
/// JSON-RPC failure envelopes with status 200.
#[derive(Debug)]
pub(crate) enum AppError {
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
