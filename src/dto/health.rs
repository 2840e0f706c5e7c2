use serde::Serialize;
use utoipa::ToSchema;

/// Coarse availability reported by `/healthcheck`.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Storage reachable.
    Ok,
    /// Storage is unreachable; try lifecycle calls answer 503.
    Degraded,
}

/// Body of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current availability.
    pub status: HealthStatus,
}

impl HealthResponse {
    /// Map the degraded flag to a response.
    pub fn from_degraded(degraded: bool) -> Self {
        let status = if degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };
        Self { status }
    }
}
