use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping both backing stores and report a degraded status if either fails.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let mut healthy = true;

    if let Err(err) = state.active_store().health_check().await {
        warn!(error = %err, "active-session store health check failed");
        healthy = false;
    }
    if let Err(err) = state.record_store().health_check().await {
        warn!(error = %err, "record store health check failed");
        healthy = false;
    }

    if healthy {
        HealthResponse::ok()
    } else {
        HealthResponse::degraded()
    }
}
