//! Shared application state: the room registry and store handles.

pub mod room;
pub mod session;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    config::AppConfig,
    dao::{chat_stream::ChatStream, record_store::RecordStore, session_store::ActiveSessionStore},
    dto::protocol::RoomKey,
};

pub use room::GameRoom;

pub type SharedState = Arc<AppState>;

/// Central application state: immutable configuration, pooled store clients,
/// and the process-local room registry.
pub struct AppState {
    config: AppConfig,
    active: Arc<dyn ActiveSessionStore>,
    records: Arc<dyn RecordStore>,
    chat: Arc<dyn ChatStream>,
    rooms: RwLock<HashMap<RoomKey, Arc<GameRoom>>>,
}

impl AppState {
    /// Construct the shared state wrapped in an [`Arc`] so it can be cloned
    /// cheaply into every handler and session task.
    pub fn new(
        config: AppConfig,
        active: Arc<dyn ActiveSessionStore>,
        records: Arc<dyn RecordStore>,
        chat: Arc<dyn ChatStream>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            active,
            records,
            chat,
            rooms: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn active_store(&self) -> Arc<dyn ActiveSessionStore> {
        self.active.clone()
    }

    pub fn record_store(&self) -> Arc<dyn RecordStore> {
        self.records.clone()
    }

    pub fn chat_stream(&self) -> Arc<dyn ChatStream> {
        self.chat.clone()
    }

    /// Look up a room by key.
    pub async fn room(&self, key: &RoomKey) -> Option<Arc<GameRoom>> {
        let rooms = self.rooms.read().await;
        rooms.get(key).cloned()
    }

    /// Register a room unless its key is already taken.
    ///
    /// The check and the insert happen under one write lock so two concurrent
    /// creations of the same key cannot both succeed.
    pub async fn insert_room(&self, room: Arc<GameRoom>) -> bool {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(room.key()) {
            return false;
        }
        rooms.insert(room.key().clone(), room);
        true
    }

    /// Unregister a room, returning it so the caller can mark it closed.
    pub async fn remove_room(&self, key: &RoomKey) -> Option<Arc<GameRoom>> {
        let mut rooms = self.rooms.write().await;
        rooms.remove(key)
    }

    /// Number of registered rooms.
    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}
