use serde::Serialize;
use utoipa::ToSchema;

/// Body of the `/healthz` probe.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when both stores answer, "degraded" otherwise.
    pub status: String,
}

impl HealthResponse {
    /// Both backing stores answered their pings.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    /// At least one backing store is unreachable.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
        }
    }
}
