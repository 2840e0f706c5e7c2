use axum::{Json, Router, extract::State, http::StatusCode, routing::get};

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    services::health_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses(
        (status = 200, description = "Storage reachable", body = HealthResponse),
        (status = 503, description = "Running in degraded mode", body = HealthResponse)
    )
)]
/// Ping the store and report whether attempt calls can be served.
pub async fn healthcheck(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let report = health_service::health_status(&state).await;
    let code = match report.status {
        HealthStatus::Ok => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report))
}

/// Health routes subtree.
pub fn router() -> Router<SharedState> {
    Router::new().route("/healthcheck", get(healthcheck))
}
