use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json, Router,
};

use crate::emergency::{Emergency, EmergencyReport};
use crate::error::DispatchError;
use crate::state::AppState;
use crate::ws::broadcast;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/emergency", axum::routing::post(create_emergency))
        .route("/api/emergency/{id}", axum::routing::get(get_emergency))
        .route("/ws", axum::routing::get(ws_handler::ws_upgrade))
        .route("/health", axum::routing::get(health_check))
        .with_state(state)
}

/// POST /api/emergency — Submission boundary for new reports.
/// Creates the emergency and runs the same matching and fan-out path the
/// message handlers use. Validation failures return 400 and store nothing.
async fn create_emergency(
    State(state): State<AppState>,
    Json(report): Json<EmergencyReport>,
) -> Result<(StatusCode, Json<Emergency>), DispatchError> {
    let emergency = state.emergencies.create(report)?;
    broadcast::announce_emergency(&state, &emergency);
    Ok((StatusCode::CREATED, Json(emergency)))
}

/// GET /api/emergency/{id} — Look up a tracked emergency.
async fn get_emergency(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Emergency>, DispatchError> {
    state
        .emergencies
        .get(&id)
        .map(Json)
        .ok_or(DispatchError::NotFound)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
