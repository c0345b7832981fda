use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mobvis_core::ExtractionError;
use serde_json::json;
use thiserror::Error;

/// Every classified extraction failure is the client's to fix, so all of them
/// surface as 400 with a `detail` message.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] ExtractionError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "detail": self.0.user_message() }));
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}
