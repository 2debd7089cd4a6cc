use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    dto::protocol::{ClientId, GameRoomStats, RoomId},
    error::AppError,
    services::{room_service, websocket_service},
    state::SharedState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
/// Query parameters accepted by the room control endpoints.
pub struct RoomQuery {
    pub client_id: String,
    pub room_id: String,
    pub user_id: Option<String>,
    pub init_data: Option<String>,
}

impl RoomQuery {
    fn ids(&self) -> (ClientId, RoomId) {
        (
            ClientId(self.client_id.clone()),
            RoomId(self.room_id.clone()),
        )
    }
}

#[utoipa::path(
    get,
    path = "/api/room/create",
    tag = "rooms",
    params(RoomQuery),
    responses(
        (status = 200, description = "Room created"),
        (status = 400, description = "Bad input, client not allowed, or room exists"),
        (status = 404, description = "User id missing"),
    )
)]
/// Create a custom room owned by the requesting user.
pub async fn create_room(
    State(state): State<SharedState>,
    Query(query): Query<RoomQuery>,
) -> Result<&'static str, AppError> {
    let (user_id, _) = websocket_service::resolve_identity(
        state.config(),
        query.user_id.clone(),
        None,
        query.init_data.clone(),
    )?;
    let (client_id, room_id) = query.ids();
    room_service::create_room(&state, client_id, room_id, user_id).await?;
    Ok("ok")
}

#[utoipa::path(
    get,
    path = "/api/room/delete",
    tag = "rooms",
    params(RoomQuery),
    responses(
        (status = 200, description = "Room deleted"),
        (status = 400, description = "Predefined room or not the creator"),
        (status = 404, description = "Room not found or user id missing"),
    )
)]
/// Delete a custom room; only its creator may do so.
pub async fn delete_room(
    State(state): State<SharedState>,
    Query(query): Query<RoomQuery>,
) -> Result<&'static str, AppError> {
    let (user_id, _) = websocket_service::resolve_identity(
        state.config(),
        query.user_id.clone(),
        None,
        query.init_data.clone(),
    )?;
    let (client_id, room_id) = query.ids();
    room_service::delete_room(&state, client_id, room_id, user_id).await?;
    Ok("ok")
}

#[utoipa::path(
    get,
    path = "/api/room/stats",
    tag = "rooms",
    params(RoomQuery),
    responses(
        (status = 200, description = "Room summary", body = GameRoomStats),
        (status = 400, description = "Bad room id"),
        (status = 404, description = "Room not found"),
    )
)]
/// Summary of active holds and the leaderboard for one room.
pub async fn room_stats(
    State(state): State<SharedState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<GameRoomStats>, AppError> {
    let (client_id, room_id) = query.ids();
    let stats = room_service::room_stats(&state, client_id, room_id).await?;
    Ok(Json(stats))
}

/// Configure the room control subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/api/room/create", get(create_room))
        .route("/api/room/delete", get(delete_room))
        .route("/api/room/stats", get(room_stats))
}
