use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{
    error::AppError,
    services::{course_service, websocket_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/competitions/{id}/ws",
    tag = "spectators",
    params(("id" = String, Path, description = "Competition identifier")),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 404, description = "Unknown competition")
    )
)]
/// Upgrade the HTTP connection into a spectator WebSocket for one competition.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(competition_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let competition = course_service::load_competition(&state, &competition_id).await?;
    let shared_state = state.clone();
    Ok(ws.on_upgrade(move |socket| {
        websocket_service::handle_socket(shared_state, competition.id, socket)
    }))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/competitions/{id}/ws", get(ws_handler))
}
