use crate::api::auth::auth_middleware;
use crate::api::handlers::{
    create_operation, mark_operation_read, operation_status, unread_notifications,
    update_operation,
};
use crate::api::health::health_check;
use crate::api::state::AppState;
use crate::api::ws::ws_handler;
use axum::routing::{get, post};
use axum::{Router, middleware};

pub fn router(state: AppState) -> Router {
    let producer = Router::new()
        .route("/operation", post(create_operation))
        .route("/operation/update", post(update_operation))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/operation/status", get(operation_status))
        .route("/operation/read", post(mark_operation_read))
        .route("/notifications/unread", get(unread_notifications))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .merge(producer)
        .with_state(state)
}
