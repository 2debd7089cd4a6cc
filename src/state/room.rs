//! A game room: the per-(client, room) session map and its store handles.

use std::collections::HashSet;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Mutex;
use tracing::warn;

use crate::{
    dao::{
        chat_stream::ChatStream,
        record_store::RecordStore,
        session_store::ActiveSessionStore,
        storage::{StorageError, StorageResult},
    },
    dto::protocol::{GameRoomStats, RoomKey, UserId, UserLocale, UserPayload},
    error::GameError,
    localization::FlavorSource,
    state::session::{GameSession, SessionWire},
};

/// A room owning the live sessions for one `(client, room)` pair.
///
/// Predefined rooms carry a flavor source; custom rooms do not. A closed
/// room terminates its sessions on their next update.
pub struct GameRoom {
    key: RoomKey,
    active: Arc<dyn ActiveSessionStore>,
    records: Arc<dyn RecordStore>,
    chat: Arc<dyn ChatStream>,
    flavor: Option<Arc<dyn FlavorSource>>,
    sessions: Mutex<HashSet<UserId>>,
    closed: AtomicBool,
}

impl GameRoom {
    /// Create the room and its chat consumer group.
    pub async fn open(
        key: RoomKey,
        active: Arc<dyn ActiveSessionStore>,
        records: Arc<dyn RecordStore>,
        chat: Arc<dyn ChatStream>,
        flavor: Option<Arc<dyn FlavorSource>>,
    ) -> StorageResult<Arc<Self>> {
        chat.init_group(key.clone()).await?;
        Ok(Arc::new(Self {
            key,
            active,
            records,
            chat,
            flavor,
            sessions: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
        }))
    }

    pub fn key(&self) -> &RoomKey {
        &self.key
    }

    pub fn flavor(&self) -> Option<&Arc<dyn FlavorSource>> {
        self.flavor.as_ref()
    }

    pub(crate) fn active_store(&self) -> &Arc<dyn ActiveSessionStore> {
        &self.active
    }

    pub(crate) fn record_store(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub(crate) fn chat_stream(&self) -> &Arc<dyn ChatStream> {
        &self.chat
    }

    /// Mark the room closed; live sessions observe this on their next tick.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether a live session exists for the user.
    pub async fn has_session(&self, user_id: &UserId) -> bool {
        let sessions = self.sessions.lock().await;
        sessions.contains(user_id)
    }

    /// Claim the user's session slot; the existence check and the insert are
    /// one atomic step under the room lock.
    pub(crate) async fn try_claim_session(&self, user_id: &UserId) -> bool {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(user_id.clone())
    }

    /// Release the user's session slot at close.
    pub(crate) async fn release_session(&self, user_id: &UserId) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(user_id);
    }

    /// Run a player's session to completion on the given wire.
    pub async fn maintain_session<W: SessionWire>(
        self: &Arc<Self>,
        user_id: UserId,
        payload: UserPayload,
        locale: UserLocale,
        wire: W,
    ) -> Option<GameError> {
        GameSession::new(self.clone(), user_id, payload, locale, wire)
            .maintain()
            .await
    }

    /// Room summary: five sub-queries, each failing independently.
    ///
    /// Failed sub-queries are logged and their fields left absent, so a
    /// partial summary is still served.
    pub async fn stats(&self, payload_count: i64) -> GameRoomStats {
        let key = &self.key;

        GameRoomStats {
            count_active: log_failed(
                "count_active",
                key,
                self.active.count_active(key.clone()).await,
            ),
            count_leaderboard: log_failed(
                "count_leaderboard",
                key,
                self.records.count_users(key.clone()).await,
            ),
            best_overall_duration: log_failed(
                "best_overall_duration",
                key,
                self.records.best_overall(key.clone()).await,
            ),
            best_todays_duration: log_failed(
                "best_todays_duration",
                key,
                self.records.best_today(key.clone()).await,
            ),
            best_users_payloads: log_failed(
                "best_users_payloads",
                key,
                self.active.best_payloads(key.clone(), payload_count).await,
            ),
        }
    }
}

fn log_failed<T>(query: &'static str, key: &RoomKey, result: Result<T, StorageError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(room = %key, query, error = %err, "room stats sub-query failed");
            None
        }
    }
}
