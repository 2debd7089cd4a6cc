//! Volatile store tracking live holds, payloads, and custom room ownership.

use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;
use crate::dto::protocol::{RoomKey, UserId, UserPayload};

/// Seconds a liveness entry survives without a heartbeat before it is swept.
pub const SESSION_TTL_SECONDS: i64 = 40;

/// One-in-N chance that a liveness write or removal also runs the sweep.
pub const CLEANUP_RAND_CHANCE: u32 = 5;

/// Outcome of removing a custom room from the ownership registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomRoomRemoval {
    Removed,
    NotFound,
    NotOwner,
}

/// Ranked view of live holds per room, with TTL-based liveness sweeping.
///
/// Implementations keep, per room, a duration-ranked set and a
/// heartbeat-ranked set of users, a `user -> payload` map, and a per-client
/// `room -> creator` registry of custom rooms. Ranked operations must be
/// atomic per key; everything else is best-effort.
pub trait ActiveSessionStore: Send + Sync {
    /// Verify the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Record the user's current hold duration and refresh their heartbeat.
    fn set_liveness(
        &self,
        key: RoomKey,
        user: UserId,
        duration: i64,
        now: i64,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Drop the user from both ranked sets.
    fn remove_liveness(
        &self,
        key: RoomKey,
        user: UserId,
        now: i64,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// 1-based place from the top of the duration ranking, or `None` when the
    /// user is not currently ranked.
    fn place_of(&self, key: RoomKey, user: UserId)
    -> BoxFuture<'static, StorageResult<Option<i64>>>;

    /// Number of users currently ranked in the room.
    fn count_active(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>>;

    /// Store the user's payload for the lifetime of their session.
    fn add_payload(
        &self,
        key: RoomKey,
        user: UserId,
        payload: UserPayload,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Remove the user's payload.
    fn remove_payload(&self, key: RoomKey, user: UserId) -> BoxFuture<'static, StorageResult<()>>;

    /// Payloads of the top `count` users by hold duration; users without a
    /// stored payload are skipped.
    fn best_payloads(
        &self,
        key: RoomKey,
        count: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<UserPayload>>>;

    /// Record `room -> creator` ownership; `false` when the room is already
    /// registered.
    fn create_custom_room(
        &self,
        key: RoomKey,
        creator: UserId,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Remove a custom room if `requester` is its recorded creator.
    fn remove_custom_room(
        &self,
        key: RoomKey,
        requester: UserId,
    ) -> BoxFuture<'static, StorageResult<CustomRoomRemoval>>;

    /// All custom rooms recorded across clients, with their creators.
    fn list_custom_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<(RoomKey, UserId)>>>;
}
