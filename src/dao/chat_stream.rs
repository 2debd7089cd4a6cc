//! Per-room ordered chat stream with per-consumer read offsets.

use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;
use crate::dto::protocol::{ChatMessage, RoomKey, UserId};

/// Ordered message stream per room, consumed through a shared group so each
/// player sees every message exactly once.
pub trait ChatStream: Send + Sync {
    /// Create the room's stream and consumer group; idempotent.
    fn init_group(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<()>>;

    /// Join a player to the room's consumer group; idempotent.
    fn add_consumer(&self, key: RoomKey, user: UserId) -> BoxFuture<'static, StorageResult<()>>;

    /// Append a message; `msg.user_id` identifies the author.
    fn push(&self, key: RoomKey, msg: ChatMessage) -> BoxFuture<'static, StorageResult<()>>;

    /// Next unread message for this consumer, or `None` when the stream has
    /// nothing new for them.
    fn pop(
        &self,
        key: RoomKey,
        user: UserId,
    ) -> BoxFuture<'static, StorageResult<Option<ChatMessage>>>;
}
