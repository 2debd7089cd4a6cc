//! Control operations on the room registry: create, delete, stats, restore.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    dao::session_store::CustomRoomRemoval,
    dao::storage::StorageResult,
    dto::protocol::{ClientId, GameRoomStats, RoomId, RoomKey, UserId},
    dto::validation::validate_room_id,
    error::AppError,
    state::{GameRoom, SharedState},
};

/// How many top payloads the stats endpoint reports.
const USER_PAYLOAD_COUNT_IN_STATS: i64 = 3;

/// Create a custom room owned by `user_id`.
///
/// The ownership row in the volatile store is the source of truth; the
/// in-memory registration follows it.
pub async fn create_room(
    state: &SharedState,
    client_id: ClientId,
    room_id: RoomId,
    user_id: UserId,
) -> Result<(), AppError> {
    validate_room_id(&room_id.0).map_err(bad_request)?;

    if !state.config().is_client_allowed(&client_id) {
        return Err(AppError::BadRequest("Client not allowed".into()));
    }

    let key = RoomKey::new(client_id, room_id);
    if state.room(&key).await.is_some() {
        return Err(AppError::BadRequest("Room exists".into()));
    }

    let recorded = state
        .active_store()
        .create_custom_room(key.clone(), user_id.clone())
        .await?;
    if !recorded {
        return Err(AppError::BadRequest("Room exists".into()));
    }

    let room = open_custom_room(state, key.clone()).await?;
    if !state.insert_room(room).await {
        return Err(AppError::BadRequest("Room exists".into()));
    }

    info!(room = %key, user_id = %user_id, "custom room created");
    Ok(())
}

/// Delete a custom room; only its creator may do so, and predefined rooms
/// are never deletable.
pub async fn delete_room(
    state: &SharedState,
    client_id: ClientId,
    room_id: RoomId,
    user_id: UserId,
) -> Result<(), AppError> {
    validate_room_id(&room_id.0).map_err(bad_request)?;

    let key = RoomKey::new(client_id, room_id);
    if state.config().is_predefined(&key) {
        return Err(AppError::BadRequest("Room cannot be deleted".into()));
    }

    match state
        .active_store()
        .remove_custom_room(key.clone(), user_id.clone())
        .await?
    {
        CustomRoomRemoval::NotFound => {
            return Err(AppError::NotFound("Room not found".into()));
        }
        CustomRoomRemoval::NotOwner => {
            return Err(AppError::BadRequest(
                "Room does not belong to the user".into(),
            ));
        }
        CustomRoomRemoval::Removed => {}
    }

    // Closing is advisory: live sessions observe the flag on their next tick.
    if let Some(room) = state.remove_room(&key).await {
        room.close();
    }

    info!(room = %key, user_id = %user_id, "custom room deleted");
    Ok(())
}

/// Summary of a registered room.
pub async fn room_stats(
    state: &SharedState,
    client_id: ClientId,
    room_id: RoomId,
) -> Result<GameRoomStats, AppError> {
    validate_room_id(&room_id.0).map_err(bad_request)?;

    let key = RoomKey::new(client_id, room_id);
    let room = state
        .room(&key)
        .await
        .ok_or_else(|| AppError::NotFound("Room not found".into()))?;

    Ok(room.stats(USER_PAYLOAD_COUNT_IN_STATS).await)
}

/// Re-register custom rooms recorded in the volatile store, so a restart
/// does not orphan them.
pub async fn restore_custom_rooms(state: &SharedState) -> StorageResult<usize> {
    let mut restored = 0;
    for (key, creator) in state.active_store().list_custom_rooms().await? {
        if state.config().is_predefined(&key) || state.room(&key).await.is_some() {
            continue;
        }
        match open_custom_room(state, key.clone()).await {
            Ok(room) => {
                if state.insert_room(room).await {
                    restored += 1;
                    info!(room = %key, creator = %creator, "restored custom room");
                }
            }
            Err(err) => {
                warn!(room = %key, error = %err, "failed to restore custom room");
            }
        }
    }
    Ok(restored)
}

/// Custom rooms carry no flavor bundle.
async fn open_custom_room(state: &SharedState, key: RoomKey) -> Result<Arc<GameRoom>, AppError> {
    GameRoom::open(
        key,
        state.active_store(),
        state.record_store(),
        state.chat_stream(),
        None,
    )
    .await
    .map_err(Into::into)
}

fn bad_request(err: validator::ValidationError) -> AppError {
    let message = err
        .message
        .as_deref()
        .unwrap_or("invalid room id")
        .to_owned();
    AppError::BadRequest(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::memory::{MemoryChatStream, MemoryRecordStore, MemorySessionStore},
        state::AppState,
    };

    fn test_state() -> SharedState {
        AppState::new(
            AppConfig::for_tests(),
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryRecordStore::new()),
            Arc::new(MemoryChatStream::new()),
        )
    }

    fn key(room: &str) -> RoomKey {
        RoomKey::new("demo".into(), room.into())
    }

    #[tokio::test]
    async fn custom_room_lifecycle_enforces_ownership() {
        let state = test_state();

        create_room(&state, "demo".into(), "r42".into(), "u1".into())
            .await
            .unwrap();
        assert!(state.room(&key("r42")).await.is_some());

        // Creating it again fails, whoever asks.
        let err = create_room(&state, "demo".into(), "r42".into(), "u1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        // Only the creator may delete.
        let err = delete_room(&state, "demo".into(), "r42".into(), "u2".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let room = state.room(&key("r42")).await.unwrap();
        delete_room(&state, "demo".into(), "r42".into(), "u1".into())
            .await
            .unwrap();
        assert!(room.is_closed());
        assert!(state.room(&key("r42")).await.is_none());
    }

    #[tokio::test]
    async fn unknown_clients_cannot_create_rooms() {
        let state = test_state();
        let err = create_room(&state, "mystery".into(), "r1".into(), "u1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn room_id_length_is_enforced() {
        let state = test_state();
        let at_limit = "a".repeat(36);
        let over_limit = "a".repeat(37);

        create_room(&state, "demo".into(), at_limit.as_str().into(), "u1".into())
            .await
            .unwrap();
        let err = create_room(
            &state,
            "demo".into(),
            over_limit.as_str().into(),
            "u1".into(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn predefined_rooms_cannot_be_deleted() {
        let state = test_state();
        let err = delete_room(&state, "demo".into(), "peace".into(), "u1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn deleting_an_unknown_room_is_not_found() {
        let state = test_state();
        let err = delete_room(&state, "demo".into(), "ghost".into(), "u1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn stats_for_unknown_room_is_not_found() {
        let state = test_state();
        let err = room_stats(&state, "demo".into(), "ghost".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn restore_reinstates_recorded_custom_rooms() {
        let state = test_state();
        state
            .active_store()
            .create_custom_room(key("r7"), "u1".into())
            .await
            .unwrap();

        let restored = restore_custom_rooms(&state).await.unwrap();
        assert_eq!(restored, 1);
        assert!(state.room(&key("r7")).await.is_some());

        // Restoring again is a no-op.
        assert_eq!(restore_custom_rooms(&state).await.unwrap(), 0);
    }
}
