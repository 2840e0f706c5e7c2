use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::{course_service, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/competitions/{id}/sse",
    tag = "spectators",
    params(("id" = String, Path, description = "Competition identifier")),
    responses(
        (status = 200, description = "Try updates of the competition", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown competition")
    )
)]
/// Stream live try updates of a competition to spectators.
pub async fn competition_stream(
    State(state): State<SharedState>,
    Path(competition_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let competition = course_service::load_competition(&state, &competition_id).await?;
    info!(competition_id = %competition.id, "New spectator SSE connection");
    Ok(sse_service::subscribe(state, competition.id).await)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/competitions/{id}/sse", get(competition_stream))
}
