use axum::Router;

use crate::state::SharedState;

/// Participant routes.
pub mod course;
/// Swagger UI.
pub mod docs;
/// Health check route.
pub mod health;
/// SSE spectator route.
pub mod sse;
/// WebSocket spectator route.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(websocket::router())
        .merge(course::router(state.clone()));

    api_router.merge(docs::router()).with_state(state)
}
