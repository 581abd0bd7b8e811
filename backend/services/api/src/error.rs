use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mca_common::error::McaError;

pub struct ApiError(pub McaError);

impl From<McaError> for ApiError {
    fn from(err: McaError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            McaError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            McaError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            other => {
                tracing::error!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
