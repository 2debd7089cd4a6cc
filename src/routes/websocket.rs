use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    dto::protocol::{ClientId, RoomId, RoomKey, UserPayload},
    error::AppError,
    services::websocket_service,
    state::SharedState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
/// Query parameters accepted on the socket upgrade.
pub struct WsQuery {
    pub client_id: String,
    pub room_id: String,
    pub user_id: Option<String>,
    pub locale: Option<String>,
    pub payload: Option<String>,
    pub init_data: Option<String>,
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "gameplay",
    params(WsQuery),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 400, description = "Invalid init data"),
        (status = 404, description = "Room not found or user id missing"),
    )
)]
/// Upgrade the HTTP connection into a gameplay session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let (user_id, locale) = websocket_service::resolve_identity(
        state.config(),
        query.user_id,
        query.locale,
        query.init_data,
    )?;

    let key = RoomKey::new(ClientId(query.client_id), RoomId(query.room_id));
    let room = state
        .room(&key)
        .await
        .ok_or_else(|| AppError::NotFound("Room not found".into()))?;

    let payload = UserPayload(query.payload.unwrap_or_default());
    Ok(ws.on_upgrade(move |socket| {
        websocket_service::handle_socket(room, user_id, payload, locale, socket)
    }))
}

/// Socket upgrade subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
