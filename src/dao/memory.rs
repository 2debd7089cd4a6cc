//! In-memory store fakes used by the engine tests.
//!
//! They honor the same contracts as the Redis and Postgres backends but run
//! the liveness sweep on every call instead of probabilistically, which keeps
//! tests deterministic without changing the observable contract.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{NaiveTime, Utc};
use futures::{FutureExt, future::BoxFuture};

use crate::dao::{
    chat_stream::ChatStream,
    record_store::RecordStore,
    session_store::{ActiveSessionStore, CustomRoomRemoval, SESSION_TTL_SECONDS},
    storage::StorageResult,
};
use crate::dto::protocol::{ChatMessage, ClientId, GameplayRecord, RoomKey, UserId, UserPayload};

#[derive(Default)]
struct RoomVolatile {
    durations: HashMap<String, i64>,
    heartbeats: HashMap<String, i64>,
    payloads: HashMap<String, String>,
}

impl RoomVolatile {
    fn sweep(&mut self, now: i64) {
        let cutoff = now - SESSION_TTL_SECONDS;
        let expired: Vec<String> = self
            .heartbeats
            .iter()
            .filter(|(_, ts)| **ts <= cutoff)
            .map(|(user, _)| user.clone())
            .collect();
        for user in expired {
            self.durations.remove(&user);
            self.heartbeats.remove(&user);
        }
    }

    /// Members ordered the way a ranked set orders them: score ascending,
    /// ties broken lexicographically.
    fn ranked(&self) -> Vec<(&String, i64)> {
        let mut members: Vec<_> = self
            .durations
            .iter()
            .map(|(user, duration)| (user, *duration))
            .collect();
        members.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        members
    }
}

#[derive(Default)]
struct SessionState {
    rooms: HashMap<RoomKey, RoomVolatile>,
    custom_rooms: HashMap<ClientId, HashMap<String, String>>,
}

/// Deterministic stand-in for the Redis active-session store.
#[derive(Default, Clone)]
pub struct MemorySessionStore {
    state: Arc<Mutex<SessionState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct view of a user's heartbeat, for sweep assertions.
    pub fn heartbeat_of(&self, key: &RoomKey, user: &UserId) -> Option<i64> {
        let state = self.state.lock().expect("session store lock");
        state
            .rooms
            .get(key)
            .and_then(|room| room.heartbeats.get(&user.0).copied())
    }
}

impl ActiveSessionStore for MemorySessionStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        async { Ok(()) }.boxed()
    }

    fn set_liveness(
        &self,
        key: RoomKey,
        user: UserId,
        duration: i64,
        now: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().expect("session store lock");
            let room = state.rooms.entry(key).or_default();
            room.durations.insert(user.0.clone(), duration);
            room.heartbeats.insert(user.0, now);
            room.sweep(now);
            Ok(())
        }
        .boxed()
    }

    fn remove_liveness(
        &self,
        key: RoomKey,
        user: UserId,
        now: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().expect("session store lock");
            if let Some(room) = state.rooms.get_mut(&key) {
                room.durations.remove(&user.0);
                room.heartbeats.remove(&user.0);
                room.sweep(now);
            }
            Ok(())
        }
        .boxed()
    }

    fn place_of(
        &self,
        key: RoomKey,
        user: UserId,
    ) -> BoxFuture<'static, StorageResult<Option<i64>>> {
        let state = self.state.clone();
        async move {
            let state = state.lock().expect("session store lock");
            let Some(room) = state.rooms.get(&key) else {
                return Ok(None);
            };
            let ranked = room.ranked();
            let count = ranked.len() as i64;
            let place = ranked
                .iter()
                .position(|(member, _)| **member == user.0)
                .map(|rank| count - rank as i64);
            Ok(place)
        }
        .boxed()
    }

    fn count_active(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>> {
        let state = self.state.clone();
        async move {
            let state = state.lock().expect("session store lock");
            Ok(state
                .rooms
                .get(&key)
                .map(|room| room.durations.len() as i64)
                .unwrap_or_default())
        }
        .boxed()
    }

    fn add_payload(
        &self,
        key: RoomKey,
        user: UserId,
        payload: UserPayload,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().expect("session store lock");
            state
                .rooms
                .entry(key)
                .or_default()
                .payloads
                .insert(user.0, payload.0);
            Ok(())
        }
        .boxed()
    }

    fn remove_payload(&self, key: RoomKey, user: UserId) -> BoxFuture<'static, StorageResult<()>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().expect("session store lock");
            if let Some(room) = state.rooms.get_mut(&key) {
                room.payloads.remove(&user.0);
            }
            Ok(())
        }
        .boxed()
    }

    fn best_payloads(
        &self,
        key: RoomKey,
        count: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<UserPayload>>> {
        let state = self.state.clone();
        async move {
            let state = state.lock().expect("session store lock");
            let Some(room) = state.rooms.get(&key) else {
                return Ok(Vec::new());
            };
            let payloads = room
                .ranked()
                .into_iter()
                .rev()
                .take(count.max(0) as usize)
                .filter_map(|(user, _)| room.payloads.get(user))
                .filter(|payload| !payload.is_empty())
                .map(|payload| UserPayload(payload.clone()))
                .collect();
            Ok(payloads)
        }
        .boxed()
    }

    fn create_custom_room(
        &self,
        key: RoomKey,
        creator: UserId,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().expect("session store lock");
            let rooms = state.custom_rooms.entry(key.client_id).or_default();
            if rooms.contains_key(&key.room_id.0) {
                return Ok(false);
            }
            rooms.insert(key.room_id.0, creator.0);
            Ok(true)
        }
        .boxed()
    }

    fn remove_custom_room(
        &self,
        key: RoomKey,
        requester: UserId,
    ) -> BoxFuture<'static, StorageResult<CustomRoomRemoval>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().expect("session store lock");
            let Some(rooms) = state.custom_rooms.get_mut(&key.client_id) else {
                return Ok(CustomRoomRemoval::NotFound);
            };
            match rooms.get(&key.room_id.0) {
                None => Ok(CustomRoomRemoval::NotFound),
                Some(creator) if *creator != requester.0 => Ok(CustomRoomRemoval::NotOwner),
                Some(_) => {
                    rooms.remove(&key.room_id.0);
                    Ok(CustomRoomRemoval::Removed)
                }
            }
        }
        .boxed()
    }

    fn list_custom_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<(RoomKey, UserId)>>> {
        let state = self.state.clone();
        async move {
            let state = state.lock().expect("session store lock");
            let mut rooms = Vec::new();
            for (client, entries) in &state.custom_rooms {
                for (room, creator) in entries {
                    rooms.push((
                        RoomKey::new(client.clone(), room.as_str().into()),
                        UserId(creator.clone()),
                    ));
                }
            }
            Ok(rooms)
        }
        .boxed()
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RecordRow {
    user: String,
    end_ts: i64,
    duration: i64,
}

#[derive(Default)]
struct RecordState {
    rooms: HashMap<RoomKey, BTreeSet<RecordRow>>,
}

/// Deterministic stand-in for the Postgres record store.
#[derive(Default, Clone)]
pub struct MemoryRecordStore {
    state: Arc<Mutex<RecordState>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        async { Ok(()) }.boxed()
    }

    fn add_record(
        &self,
        key: RoomKey,
        user: UserId,
        record: GameplayRecord,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().expect("record store lock");
            // BTreeSet membership mirrors the UNIQUE constraint.
            state.rooms.entry(key).or_default().insert(RecordRow {
                user: user.0,
                end_ts: record.timestamp,
                duration: record.duration,
            });
            Ok(())
        }
        .boxed()
    }

    fn place_for_duration(
        &self,
        key: RoomKey,
        duration: i64,
    ) -> BoxFuture<'static, StorageResult<i64>> {
        let state = self.state.clone();
        async move {
            let state = state.lock().expect("record store lock");
            let better: HashSet<i64> = state
                .rooms
                .get(&key)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| row.duration > duration)
                        .map(|row| row.duration)
                        .collect()
                })
                .unwrap_or_default();
            Ok(better.len() as i64 + 1)
        }
        .boxed()
    }

    fn user_place(&self, key: RoomKey, user: UserId) -> BoxFuture<'static, StorageResult<i64>> {
        let state = self.state.clone();
        async move {
            let state = state.lock().expect("record store lock");
            let Some(rows) = state.rooms.get(&key) else {
                return Ok(1);
            };
            let best = rows
                .iter()
                .filter(|row| row.user == user.0)
                .map(|row| row.duration)
                .max()
                .unwrap_or_default();
            let better = rows.iter().filter(|row| row.duration > best).count() as i64;
            Ok(better + 1)
        }
        .boxed()
    }

    fn count_users(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>> {
        let state = self.state.clone();
        async move {
            let state = state.lock().expect("record store lock");
            let users: HashSet<&str> = state
                .rooms
                .get(&key)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| row.duration > 0)
                        .map(|row| row.user.as_str())
                        .collect()
                })
                .unwrap_or_default();
            Ok(users.len() as i64)
        }
        .boxed()
    }

    fn best_overall(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>> {
        let state = self.state.clone();
        async move {
            let state = state.lock().expect("record store lock");
            let best = state
                .rooms
                .get(&key)
                .and_then(|rows| {
                    rows.iter()
                        .filter(|row| row.duration > 0)
                        .map(|row| row.duration)
                        .max()
                })
                .unwrap_or_default();
            Ok(best)
        }
        .boxed()
    }

    fn best_today(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>> {
        let state = self.state.clone();
        async move {
            let day_start = Utc::now()
                .date_naive()
                .and_time(NaiveTime::MIN)
                .and_utc()
                .timestamp();
            let state = state.lock().expect("record store lock");
            let best = state
                .rooms
                .get(&key)
                .and_then(|rows| {
                    rows.iter()
                        .filter(|row| row.end_ts >= day_start)
                        .map(|row| row.duration)
                        .max()
                })
                .unwrap_or_default();
            Ok(best)
        }
        .boxed()
    }
}

#[derive(Default)]
struct ChatRoom {
    messages: Vec<ChatMessage>,
    /// Next undelivered index; messages before it have been handed to some
    /// consumer already (single delivery per group, as with stream groups).
    next: usize,
}

#[derive(Default)]
struct ChatState {
    rooms: HashMap<RoomKey, ChatRoom>,
}

/// Deterministic stand-in for the Redis chat stream.
#[derive(Default, Clone)]
pub struct MemoryChatStream {
    state: Arc<Mutex<ChatState>>,
}

impl MemoryChatStream {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatStream for MemoryChatStream {
    fn init_group(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<()>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().expect("chat stream lock");
            state.rooms.entry(key).or_default();
            Ok(())
        }
        .boxed()
    }

    fn add_consumer(&self, key: RoomKey, _user: UserId) -> BoxFuture<'static, StorageResult<()>> {
        // Stream groups create consumers on first read; joining only has to
        // make sure the room's stream exists.
        let state = self.state.clone();
        async move {
            let mut state = state.lock().expect("chat stream lock");
            state.rooms.entry(key).or_default();
            Ok(())
        }
        .boxed()
    }

    fn push(&self, key: RoomKey, msg: ChatMessage) -> BoxFuture<'static, StorageResult<()>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().expect("chat stream lock");
            state.rooms.entry(key).or_default().messages.push(msg);
            Ok(())
        }
        .boxed()
    }

    fn pop(
        &self,
        key: RoomKey,
        _user: UserId,
    ) -> BoxFuture<'static, StorageResult<Option<ChatMessage>>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().expect("chat stream lock");
            let Some(room) = state.rooms.get_mut(&key) else {
                return Ok(None);
            };
            let Some(msg) = room.messages.get(room.next).cloned() else {
                return Ok(None);
            };
            room.next += 1;
            Ok(Some(msg))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RoomKey {
        RoomKey::new("demo".into(), "peace".into())
    }

    #[tokio::test]
    async fn liveness_older_than_ttl_is_swept() {
        let store = MemorySessionStore::new();
        let now = 1_000_000;

        store
            .set_liveness(key(), "u2".into(), 10, now - 50)
            .await
            .unwrap();
        assert_eq!(store.count_active(key()).await.unwrap(), 1);

        // Any later liveness write sweeps entries beyond the TTL.
        store
            .set_liveness(key(), "u1".into(), 5, now)
            .await
            .unwrap();
        assert_eq!(store.count_active(key()).await.unwrap(), 1);
        assert_eq!(store.place_of(key(), "u2".into()).await.unwrap(), None);
        assert!(store.heartbeat_of(&key(), &"u2".into()).is_none());
    }

    #[tokio::test]
    async fn place_is_one_based_from_the_top() {
        let store = MemorySessionStore::new();
        let now = 1_000_000;
        store
            .set_liveness(key(), "slow".into(), 3, now)
            .await
            .unwrap();
        store
            .set_liveness(key(), "fast".into(), 30, now)
            .await
            .unwrap();

        assert_eq!(
            store.place_of(key(), "fast".into()).await.unwrap(),
            Some(1)
        );
        assert_eq!(
            store.place_of(key(), "slow".into()).await.unwrap(),
            Some(2)
        );
        assert_eq!(store.place_of(key(), "ghost".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn best_payloads_skip_absent_and_empty() {
        let store = MemorySessionStore::new();
        let now = 1_000_000;
        for (user, duration) in [("a", 10), ("b", 20), ("c", 30)] {
            store
                .set_liveness(key(), user.into(), duration, now)
                .await
                .unwrap();
        }
        store
            .add_payload(key(), "c".into(), "carol".into())
            .await
            .unwrap();
        store
            .add_payload(key(), "a".into(), "alice".into())
            .await
            .unwrap();

        let payloads = store.best_payloads(key(), 3).await.unwrap();
        assert_eq!(payloads, vec!["carol".into(), "alice".into()]);
    }

    #[tokio::test]
    async fn duplicate_records_collapse_to_one_row() {
        let store = MemoryRecordStore::new();
        let record = GameplayRecord {
            timestamp: 1_000_107,
            duration: 7,
        };
        store.add_record(key(), "u1".into(), record).await.unwrap();
        store.add_record(key(), "u1".into(), record).await.unwrap();

        assert_eq!(store.count_users(key()).await.unwrap(), 1);
        assert_eq!(store.best_overall(key()).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn place_for_duration_is_one_for_the_best() {
        let store = MemoryRecordStore::new();
        store
            .add_record(
                key(),
                "u1".into(),
                GameplayRecord {
                    timestamp: 1_000_100,
                    duration: 100,
                },
            )
            .await
            .unwrap();

        assert_eq!(store.place_for_duration(key(), 150).await.unwrap(), 1);
        assert_eq!(store.place_for_duration(key(), 100).await.unwrap(), 1);
        assert_eq!(store.place_for_duration(key(), 50).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn chat_messages_are_delivered_once_in_order() {
        let chat = MemoryChatStream::new();
        chat.init_group(key()).await.unwrap();
        chat.add_consumer(key(), "u1".into()).await.unwrap();
        chat.add_consumer(key(), "u2".into()).await.unwrap();

        chat.push(
            key(),
            ChatMessage {
                user_id: Some("u1".into()),
                message: "hi".into(),
            },
        )
        .await
        .unwrap();

        let delivered = chat.pop(key(), "u2".into()).await.unwrap().unwrap();
        assert_eq!(delivered.user_id, Some("u1".into()));
        assert_eq!(delivered.message, "hi");

        assert!(chat.pop(key(), "u1".into()).await.unwrap().is_none());
        assert!(chat.pop(key(), "u2".into()).await.unwrap().is_none());
    }
}
