use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report degraded mode while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::from_degraded(state.is_degraded())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dto::health::HealthStatus, services::test_support::TestArena};

    #[tokio::test]
    async fn reports_degraded_without_store() {
        let arena = TestArena::new().await;
        assert_eq!(health_status(&arena.state).await.status, HealthStatus::Ok);

        arena.state.clear_store().await;
        assert_eq!(
            health_status(&arena.state).await.status,
            HealthStatus::Degraded
        );
    }
}
