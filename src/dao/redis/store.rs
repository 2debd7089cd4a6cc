use std::collections::HashMap;

use futures::{FutureExt, future::BoxFuture};
use rand::Rng;
use redis::{
    AsyncCommands,
    aio::ConnectionManager,
    streams::{StreamReadOptions, StreamReadReply},
};

use super::{
    config::RedisConfig,
    error::{RedisDaoError, RedisResult},
};
use crate::dao::{
    chat_stream::ChatStream,
    session_store::{
        ActiveSessionStore, CLEANUP_RAND_CHANCE, CustomRoomRemoval, SESSION_TTL_SECONDS,
    },
    storage::StorageResult,
};
use crate::dto::protocol::{ChatMessage, ClientId, RoomId, RoomKey, UserId, UserPayload};

const CHAT_GROUP: &str = "players";

fn sessions_key(key: &RoomKey) -> String {
    format!("{}:sessions:{}", key.client_id, key.room_id)
}

fn session_ts_key(key: &RoomKey) -> String {
    format!("{}:sessionts:{}", key.client_id, key.room_id)
}

fn payloads_key(key: &RoomKey) -> String {
    format!("{}:payloads:{}", key.client_id, key.room_id)
}

fn custom_rooms_key(client_id: &ClientId) -> String {
    format!("{client_id}:rooms")
}

fn chat_key(key: &RoomKey) -> String {
    format!("{}:chat:{}", key.client_id, key.room_id)
}

/// Redis-backed active-session store and chat stream.
///
/// [`ConnectionManager`] multiplexes and reconnects internally, so the store
/// is a cheap clone handed to every session task.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Open the connection and verify it with a ping.
    pub async fn connect(config: RedisConfig) -> RedisResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|source| RedisDaoError::Connect { source })?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|source| RedisDaoError::Connect { source })?;

        let mut con = manager.clone();
        redis::cmd("PING")
            .query_async::<()>(&mut con)
            .await
            .map_err(|source| RedisDaoError::InitialPing { source })?;

        Ok(Self { manager })
    }

    /// Ping the backend; used by the health endpoint.
    pub async fn ping(&self) -> RedisResult<()> {
        let mut con = self.manager.clone();
        redis::cmd("PING")
            .query_async::<()>(&mut con)
            .await
            .map_err(|source| RedisDaoError::command("ping", source))
    }
}

/// Drop every member whose heartbeat is older than the session TTL.
async fn sweep_expired(
    con: &mut ConnectionManager,
    sessions_key: &str,
    ts_key: &str,
    now: i64,
) -> RedisResult<()> {
    let cutoff = now - SESSION_TTL_SECONDS;
    let expired: Vec<String> = con
        .zrangebyscore(ts_key, "-inf", cutoff)
        .await
        .map_err(|source| RedisDaoError::command("zrangebyscore", source))?;

    if expired.is_empty() {
        return Ok(());
    }

    let _: () = con
        .zrem(sessions_key, &expired)
        .await
        .map_err(|source| RedisDaoError::command("zrem", source))?;
    let _: () = con
        .zrembyscore(ts_key, "-inf", cutoff)
        .await
        .map_err(|source| RedisDaoError::command("zrembyscore", source))?;
    Ok(())
}

fn should_sweep() -> bool {
    rand::rng().random_range(0..CLEANUP_RAND_CHANCE) == 0
}

impl ActiveSessionStore for RedisStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        async move {
            store.ping().await?;
            Ok(())
        }
        .boxed()
    }

    fn set_liveness(
        &self,
        key: RoomKey,
        user: UserId,
        duration: i64,
        now: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let mut con = self.manager.clone();
        async move {
            let sessions = sessions_key(&key);
            let ts = session_ts_key(&key);
            let member = user.to_string();

            let _: () = con
                .zadd(&sessions, &member, duration)
                .await
                .map_err(|source| RedisDaoError::command("zadd", source))?;
            let _: () = con
                .zadd(&ts, &member, now)
                .await
                .map_err(|source| RedisDaoError::command("zadd", source))?;

            if should_sweep() {
                sweep_expired(&mut con, &sessions, &ts, now).await?;
            }
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
        let mut con = self.manager.clone();
        async move {
            let sessions = sessions_key(&key);
            let ts = session_ts_key(&key);
            let member = user.to_string();

            let _: () = con
                .zrem(&sessions, &member)
                .await
                .map_err(|source| RedisDaoError::command("zrem", source))?;
            let _: () = con
                .zrem(&ts, &member)
                .await
                .map_err(|source| RedisDaoError::command("zrem", source))?;

            if should_sweep() {
                sweep_expired(&mut con, &sessions, &ts, now).await?;
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
        let mut con = self.manager.clone();
        async move {
            let sessions = sessions_key(&key);
            let count: i64 = con
                .zcount(&sessions, "-inf", "+inf")
                .await
                .map_err(|source| RedisDaoError::command("zcount", source))?;
            let rank: Option<i64> = con
                .zrank(&sessions, user.to_string())
                .await
                .map_err(|source| RedisDaoError::command("zrank", source))?;
            Ok(rank.map(|rank| count - rank))
        }
        .boxed()
    }

    fn count_active(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>> {
        let mut con = self.manager.clone();
        async move {
            let count: i64 = con
                .zcount(sessions_key(&key), "-inf", "+inf")
                .await
                .map_err(|source| RedisDaoError::command("zcount", source))?;
            Ok(count)
        }
        .boxed()
    }

    fn add_payload(
        &self,
        key: RoomKey,
        user: UserId,
        payload: UserPayload,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let mut con = self.manager.clone();
        async move {
            let _: () = con
                .hset(payloads_key(&key), user.to_string(), payload.to_string())
                .await
                .map_err(|source| RedisDaoError::command("hset", source))?;
            Ok(())
        }
        .boxed()
    }

    fn remove_payload(&self, key: RoomKey, user: UserId) -> BoxFuture<'static, StorageResult<()>> {
        let mut con = self.manager.clone();
        async move {
            let _: () = con
                .hdel(payloads_key(&key), user.to_string())
                .await
                .map_err(|source| RedisDaoError::command("hdel", source))?;
            Ok(())
        }
        .boxed()
    }

    fn best_payloads(
        &self,
        key: RoomKey,
        count: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<UserPayload>>> {
        let mut con = self.manager.clone();
        async move {
            if count <= 0 {
                return Ok(Vec::new());
            }

            let users: Vec<String> = con
                .zrevrange(sessions_key(&key), 0, (count - 1) as isize)
                .await
                .map_err(|source| RedisDaoError::command("zrevrange", source))?;
            if users.is_empty() {
                return Ok(Vec::new());
            }

            let values: Vec<Option<String>> = redis::cmd("HMGET")
                .arg(payloads_key(&key))
                .arg(&users)
                .query_async(&mut con)
                .await
                .map_err(|source| RedisDaoError::command("hmget", source))?;

            Ok(values
                .into_iter()
                .flatten()
                .filter(|payload| !payload.is_empty())
                .map(UserPayload)
                .collect())
        }
        .boxed()
    }

    fn create_custom_room(
        &self,
        key: RoomKey,
        creator: UserId,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let mut con = self.manager.clone();
        async move {
            let added: bool = con
                .hset_nx(
                    custom_rooms_key(&key.client_id),
                    key.room_id.to_string(),
                    creator.to_string(),
                )
                .await
                .map_err(|source| RedisDaoError::command("hsetnx", source))?;
            Ok(added)
        }
        .boxed()
    }

    fn remove_custom_room(
        &self,
        key: RoomKey,
        requester: UserId,
    ) -> BoxFuture<'static, StorageResult<CustomRoomRemoval>> {
        let mut con = self.manager.clone();
        async move {
            let rooms = custom_rooms_key(&key.client_id);
            let recorded: Option<String> = con
                .hget(&rooms, key.room_id.to_string())
                .await
                .map_err(|source| RedisDaoError::command("hget", source))?;

            match recorded {
                None => Ok(CustomRoomRemoval::NotFound),
                Some(creator) if creator != requester.0 => Ok(CustomRoomRemoval::NotOwner),
                Some(_) => {
                    let _: () = con
                        .hdel(&rooms, key.room_id.to_string())
                        .await
                        .map_err(|source| RedisDaoError::command("hdel", source))?;
                    Ok(CustomRoomRemoval::Removed)
                }
            }
        }
        .boxed()
    }

    fn list_custom_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<(RoomKey, UserId)>>> {
        let mut con = self.manager.clone();
        async move {
            // Startup-only scan, so KEYS is acceptable here.
            let room_keys: Vec<String> = con
                .keys("*:rooms")
                .await
                .map_err(|source| RedisDaoError::command("keys", source))?;

            let mut rooms = Vec::new();
            for raw_key in room_keys {
                let Some(client) = raw_key.strip_suffix(":rooms") else {
                    continue;
                };
                if client.is_empty() || client.contains(':') {
                    continue;
                }

                let entries: HashMap<String, String> = con
                    .hgetall(&raw_key)
                    .await
                    .map_err(|source| RedisDaoError::command("hgetall", source))?;
                for (room_id, creator) in entries {
                    rooms.push((
                        RoomKey::new(ClientId(client.to_owned()), RoomId(room_id)),
                        UserId(creator),
                    ));
                }
            }
            Ok(rooms)
        }
        .boxed()
    }
}

impl ChatStream for RedisStore {
    fn init_group(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<()>> {
        let mut con = self.manager.clone();
        async move {
            let result: Result<(), redis::RedisError> = con
                .xgroup_create_mkstream(chat_key(&key), CHAT_GROUP, "$")
                .await;
            match result {
                Ok(()) => Ok(()),
                // An existing group means a previous process already set up
                // the stream.
                Err(err) if err.code() == Some("BUSYGROUP") => Ok(()),
                Err(source) => Err(RedisDaoError::command("xgroup_create", source).into()),
            }
        }
        .boxed()
    }

    fn add_consumer(&self, key: RoomKey, user: UserId) -> BoxFuture<'static, StorageResult<()>> {
        let mut con = self.manager.clone();
        async move {
            let _: i64 = redis::cmd("XGROUP")
                .arg("CREATECONSUMER")
                .arg(chat_key(&key))
                .arg(CHAT_GROUP)
                .arg(user.to_string())
                .query_async(&mut con)
                .await
                .map_err(|source| RedisDaoError::command("xgroup_createconsumer", source))?;
            Ok(())
        }
        .boxed()
    }

    fn push(&self, key: RoomKey, msg: ChatMessage) -> BoxFuture<'static, StorageResult<()>> {
        let mut con = self.manager.clone();
        async move {
            let author = msg.user_id.map(|user| user.0).unwrap_or_default();
            let _: String = con
                .xadd(
                    chat_key(&key),
                    "*",
                    &[("userID", author.as_str()), ("message", msg.message.as_str())],
                )
                .await
                .map_err(|source| RedisDaoError::command("xadd", source))?;
            Ok(())
        }
        .boxed()
    }

    fn pop(
        &self,
        key: RoomKey,
        user: UserId,
    ) -> BoxFuture<'static, StorageResult<Option<ChatMessage>>> {
        let mut con = self.manager.clone();
        async move {
            let stream = chat_key(&key);
            let options = StreamReadOptions::default()
                .group(CHAT_GROUP, user.to_string())
                .count(1);
            let reply: StreamReadReply = con
                .xread_options(&[&stream], &[">"], &options)
                .await
                .map_err(|source| RedisDaoError::command("xreadgroup", source))?;

            let Some(entry) = reply
                .keys
                .into_iter()
                .flat_map(|stream_key| stream_key.ids)
                .next()
            else {
                return Ok(None);
            };

            let _: i64 = con
                .xack(&stream, CHAT_GROUP, &[&entry.id])
                .await
                .map_err(|source| RedisDaoError::command("xack", source))?;

            let author: Option<String> = entry
                .get("userID")
                .filter(|author: &String| !author.is_empty());
            let message: String = entry.get("message").unwrap_or_default();

            Ok(Some(ChatMessage {
                user_id: author.map(UserId),
                message,
            }))
        }
        .boxed()
    }
}
