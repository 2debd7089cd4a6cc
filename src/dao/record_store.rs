//! Durable, append-only store of completed holds backing the leaderboard.

use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;
use crate::dto::protocol::{GameplayRecord, RoomKey, UserId};

/// Leaderboard queries over the append-only `records` table.
///
/// Places are 1-based: place 1 means no stored record in the room has a
/// strictly greater duration.
pub trait RecordStore: Send + Sync {
    /// Verify the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Append a completed hold; duplicate `(user, room, ts, duration)` rows
    /// are silently ignored.
    fn add_record(
        &self,
        key: RoomKey,
        user: UserId,
        record: GameplayRecord,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Place a hold of `duration` seconds would take on the room leaderboard.
    fn place_for_duration(
        &self,
        key: RoomKey,
        duration: i64,
    ) -> BoxFuture<'static, StorageResult<i64>>;

    /// Place of the user's best recorded duration in the room.
    fn user_place(&self, key: RoomKey, user: UserId) -> BoxFuture<'static, StorageResult<i64>>;

    /// Distinct users with at least one positive-duration record in the room.
    fn count_users(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>>;

    /// Longest duration ever recorded in the room, 0 if none.
    fn best_overall(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>>;

    /// Longest duration recorded within the current UTC day, 0 if none.
    fn best_today(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>>;
}
