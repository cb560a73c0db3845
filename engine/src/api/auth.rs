use crate::api::state::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// API key middleware for the producer routes.
///
/// Accepts `Authorization: Bearer <key>` or `x-api-key: <key>`.
/// If no API key is configured, requests are rejected.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    check_api_key(&headers, state.api_key.as_deref())?;
    Ok(next.run(request).await)
}

pub fn check_api_key(headers: &HeaderMap, configured_key: Option<&str>) -> Result<(), StatusCode> {
    let configured_key = configured_key.ok_or(StatusCode::FORBIDDEN)?;

    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    let api_key_header = headers.get("x-api-key").and_then(|h| h.to_str().ok());

    match (auth_header, api_key_header) {
        (Some(token), _) if token == configured_key => Ok(()),
        (_, Some(key)) if key == configured_key => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
