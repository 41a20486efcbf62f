use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use wallet_keeper_core::{KeeperError, RoutingError};

// ==============================================================================
// Error Type
// ==============================================================================

#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

impl From<RoutingError> for AppError {
    fn from(err: RoutingError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Keeper failures reach the caller with the backend's own message.
/// Amounts the backend cannot represent are bad requests. Unreachable daemons
/// are operator problems and log at `error`; logical rejections are caller
/// problems and log at `warn`.
impl From<KeeperError> for AppError {
    fn from(err: KeeperError) -> Self {
        if err.is_invalid_amount() {
            return Self::BadRequest(err.to_string());
        }
        if err.is_connectivity() {
            tracing::error!(error = %err, "backend unreachable");
        } else {
            tracing::warn!(error = %err, "backend rejected request");
        }
        Self::Internal(err.to_string())
    }
}
