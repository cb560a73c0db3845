use crate::api::state::AppState;
use crate::relay::Frame;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::keys;
use errors::SessionError;
use futures::{SinkExt, StreamExt, future};
use log::{error, info, warn};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: Option<String>,
}

/// `GET /ws?user_id=<owner>`: upgrades to a relay session for the owner.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> Response {
    let Some(owner) = params
        .user_id
        .as_deref()
        .and_then(keys::owner_id)
        .map(str::to_string)
    else {
        warn!("Rejected session: {}", SessionError::MissingIdentifier);
        return (StatusCode::BAD_REQUEST, "missing user_id").into_response();
    };

    ws.on_failed_upgrade(|e: axum::Error| {
        warn!("{}", SessionError::UpgradeFailed(e.to_string()));
    })
    .on_upgrade(move |socket| serve_session(socket, state, owner))
}

async fn serve_session(mut socket: WebSocket, state: AppState, owner: String) {
    let session = match state.bridge.open(Some(&owner)).await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to open session for {owner}: {e}");
            let _ = socket.send(WsMessage::Close(None)).await;
            return;
        }
    };

    let (sink, stream) = socket.split();
    let writer = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(WsMessage::from(frame))));
    let reader = stream.map(|msg| msg.map(Frame::from));

    let summary = session.run(writer, reader, state.shutdown.clone()).await;
    info!(
        "Session for {} ended: {:?}, {} delivered, {} control messages",
        summary.owner_id, summary.reason, summary.delivered, summary.control_messages
    );
}
