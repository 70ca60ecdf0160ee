//! Maps [`StockSyncError`] onto HTTP responses for the operator API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use stocksync_domain::StockSyncError;
use tracing::error;

use crate::utils::logging::error_label;

/// JSON error response for the operator endpoints.
#[derive(Debug)]
pub struct ApiError(pub StockSyncError);

impl From<StockSyncError> for ApiError {
    fn from(err: StockSyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            StockSyncError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            StockSyncError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            other => {
                error!(error = %other, error_kind = error_label(other), "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
