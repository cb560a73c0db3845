use crate::api::state::AppState;
use axum::{Json, extract::State};
use serde::Serialize;

#[derive(Serialize)]
pub struct Components {
    storage: ComponentStatus,
}

#[derive(Serialize)]
pub struct ComponentStatus {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    components: Components,
}

impl ComponentStatus {
    fn up() -> Self {
        Self {
            status: "up".to_string(),
            error: None,
        }
    }
    fn down(e: impl ToString) -> Self {
        Self {
            status: "down".to_string(),
            error: Some(e.to_string()),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage = match state.kv.ping().await {
        Ok(()) => ComponentStatus::up(),
        Err(e) => ComponentStatus::down(e),
    };

    let status = if storage.status == "up" { "up" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        components: Components { storage },
    })
}
