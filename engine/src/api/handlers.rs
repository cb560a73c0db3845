use crate::api::error::ApiError;
use crate::api::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use common::keys;
use common::model::{OperationResult, OperationStatus};
use errors::Error;
use serde::{Deserialize, Serialize};

pub const USER_ID_HEADER: &str = "X-User-ID";

#[derive(Debug, Default, Deserialize)]
pub struct OperationQuery {
    pub operation_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedOperation {
    pub operation_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateOperation {
    /// `"<owner>:<operation id>"`
    pub operation_id: String,
    pub status: String,
    #[serde(default)]
    pub error: String,
}

fn owner_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(keys::owner_id)
        .ok_or_else(|| Error::missing_identifier().into())
}

fn operation_id(query: &OperationQuery) -> Result<&str, ApiError> {
    query
        .operation_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::missing_identifier().into())
}

pub async fn operation_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OperationQuery>,
) -> Result<Json<OperationResult>, ApiError> {
    let owner = owner_id(&headers)?;
    let id = operation_id(&query)?;
    Ok(Json(state.store.get(owner, id).await?))
}

pub async fn unread_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<OperationResult>>, ApiError> {
    let owner = owner_id(&headers)?;
    Ok(Json(state.store.unread(owner).await?))
}

pub async fn mark_operation_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OperationQuery>,
) -> Result<StatusCode, ApiError> {
    let owner = owner_id(&headers)?;
    let id = operation_id(&query)?;
    state.store.mark_read(owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_operation(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CreatedOperation>, ApiError> {
    let owner = owner_id(&headers)?;
    let operation_id = state.store.create(owner).await?;
    Ok(Json(CreatedOperation { operation_id }))
}

pub async fn update_operation(
    State(state): State<AppState>,
    Json(update): Json<UpdateOperation>,
) -> Result<StatusCode, ApiError> {
    let status: OperationStatus = update.status.parse().map_err(Error::from)?;
    state
        .store
        .update(&update.operation_id, status, &update.error)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
