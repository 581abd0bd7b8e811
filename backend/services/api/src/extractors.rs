use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

pub const FUNDER_HEADER: &str = "X-Funder-Id";

/// Funder scope of the request, taken from the `X-Funder-Id` header.
pub struct FunderId(pub Uuid);

#[derive(Debug)]
pub struct FunderIdRejection(String);

impl IntoResponse for FunderIdRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.0 });
        (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for FunderId {
    type Rejection = FunderIdRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(FUNDER_HEADER)
            .ok_or_else(|| FunderIdRejection(format!("missing {FUNDER_HEADER} header")))?;

        let value = header
            .to_str()
            .map_err(|_| FunderIdRejection(format!("invalid {FUNDER_HEADER} header value")))?;

        let uuid = Uuid::parse_str(value.trim())
            .map_err(|_| FunderIdRejection(format!("invalid UUID in {FUNDER_HEADER}: {value}")))?;

        Ok(FunderId(uuid))
    }
}
