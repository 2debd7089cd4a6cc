//! Binds an upgraded WebSocket to the session engine.

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    dto::protocol::{GameplayContext, GameplayMessage, UserId, UserLocale, UserPayload},
    error::AppError,
    services::auth,
    state::{
        GameRoom,
        session::{SessionWire, WireError},
    },
};

/// Resolve the caller's identity from the query string.
///
/// A present init blob wins over explicitly supplied values; in debug mode it
/// is parsed without signature enforcement. A user id must exist either way.
pub fn resolve_identity(
    config: &AppConfig,
    user_id: Option<String>,
    locale: Option<String>,
    init_data: Option<String>,
) -> Result<(UserId, UserLocale), AppError> {
    if let Some(raw) = init_data.filter(|raw| !raw.is_empty()) {
        let parsed = if config.debug {
            auth::parse_init_data(&raw)
        } else {
            auth::verify_init_data(&raw, &config.auth_secret, Utc::now().timestamp())
        };
        let data = parsed.map_err(|err| AppError::BadRequest(err.to_string()))?;
        return Ok((data.user_id, data.locale));
    }

    let user_id = user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::NotFound("User id not provided".into()))?;
    let locale = UserLocale::from_tag(locale.as_deref().unwrap_or_default());
    Ok((UserId(user_id), locale))
}

/// Run the player's session over a freshly upgraded socket.
pub async fn handle_socket(
    room: Arc<GameRoom>,
    user_id: UserId,
    payload: UserPayload,
    locale: UserLocale,
    socket: WebSocket,
) {
    info!(room = %room.key(), user_id = %user_id, "session opened");

    let wire = WebSocketWire::new(socket);
    match room
        .maintain_session(user_id.clone(), payload, locale, wire)
        .await
    {
        None => info!(room = %room.key(), user_id = %user_id, "session closed"),
        // Client-induced rejections are routine; infrastructure faults are not.
        Some(err) if err.is_validation() => {
            info!(room = %room.key(), user_id = %user_id, error = %err, "session rejected");
        }
        Some(err) => {
            warn!(room = %room.key(), user_id = %user_id, error = %err, "session ended with errors");
        }
    }
}

/// JSON-over-WebSocket implementation of the session wire.
pub struct WebSocketWire {
    socket: WebSocket,
}

impl WebSocketWire {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl SessionWire for WebSocketWire {
    async fn read_context(&mut self) -> Result<GameplayContext, WireError> {
        loop {
            match self.socket.recv().await {
                None => return Err(WireError::Closed),
                Some(Err(err)) => return Err(WireError::Transport(err.to_string())),
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Close(_))) => return Err(WireError::Closed),
                // Control and binary frames are not part of the protocol.
                Some(Ok(_)) => continue,
            }
        }
    }

    async fn write_message(&mut self, msg: &GameplayMessage) -> Result<(), WireError> {
        let payload = serde_json::to_string(msg)?;
        self.socket
            .send(Message::Text(payload.into()))
            .await
            .map_err(|err| WireError::Transport(err.to_string()))
    }
}
