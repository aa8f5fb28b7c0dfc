use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// WebSocket upgrade endpoint. Connecting parties are anonymous until
/// they send a registration frame; the actor owns the session from here.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    actor::run_connection(socket, state).await;
}
