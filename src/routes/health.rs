use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::health::HealthResponse, services::health_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses((status = 200, description = "Backing store health", body = HealthResponse))
)]
/// Report whether both backing stores answer their pings.
pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthResponse> {
    let status = health_service::health_status(&state).await;
    Json(status)
}

/// Health probe subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/healthz", get(healthcheck))
}
