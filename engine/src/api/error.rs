use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use errors::{Error, ErrorKind};
use serde_json::json;

/// Maps store errors onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound | ErrorKind::Unauthorized => StatusCode::NOT_FOUND,
            ErrorKind::MissingIdentifier => StatusCode::BAD_REQUEST,
            ErrorKind::InvalidStatusTransition => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match status {
            StatusCode::NOT_FOUND => "operation not found".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR => {
                log::error!("Request failed: {}", self.0);
                "internal error".to_string()
            }
            _ => self.0.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
