use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use futures::{FutureExt, future::BoxFuture};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{
    config::PostgresConfig,
    error::{PostgresDaoError, PostgresResult},
};
use crate::dao::{record_store::RecordStore, storage::StorageResult};
use crate::dto::protocol::{GameplayRecord, RoomKey, UserId};

const CREATE_RECORDS_TABLE: &str = "CREATE TABLE IF NOT EXISTS records (
    id BIGSERIAL PRIMARY KEY,
    user_id VARCHAR(36) NOT NULL,
    client_id VARCHAR(36) NOT NULL,
    room_id VARCHAR(36) NOT NULL,
    ts TIMESTAMP NOT NULL DEFAULT current_timestamp,
    duration BIGINT NOT NULL,
    UNIQUE (user_id, client_id, room_id, ts, duration)
)";

const CREATE_INDEXES: [&str; 5] = [
    "CREATE INDEX IF NOT EXISTS idx_user ON records(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_client ON records(client_id)",
    "CREATE INDEX IF NOT EXISTS idx_room ON records(room_id)",
    "CREATE INDEX IF NOT EXISTS idx_ts ON records(ts)",
    "CREATE INDEX IF NOT EXISTS idx_duration ON records(duration)",
];

/// Postgres-backed leaderboard store over the append-only `records` table.
#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Open the pool and ensure the table and indexes exist.
    pub async fn connect(config: PostgresConfig) -> PostgresResult<Self> {
        let pool = PgPoolOptions::new()
            .connect(&config.url)
            .await
            .map_err(|source| PostgresDaoError::Connect { source })?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> PostgresResult<()> {
        sqlx::query(CREATE_RECORDS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|source| PostgresDaoError::EnsureSchema { source })?;

        for statement in CREATE_INDEXES {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|source| PostgresDaoError::EnsureSchema { source })?;
        }
        Ok(())
    }

    /// Verify the pool is usable; used by the health endpoint.
    pub async fn ping(&self) -> PostgresResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|source| PostgresDaoError::query("ping", source))?;
        Ok(())
    }
}

fn end_timestamp(record: &GameplayRecord) -> NaiveDateTime {
    DateTime::from_timestamp(record.timestamp, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .naive_utc()
}

fn start_of_utc_day() -> NaiveDateTime {
    Utc::now().date_naive().and_time(NaiveTime::MIN)
}

impl RecordStore for PostgresRecordStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        async move {
            store.ping().await?;
            Ok(())
        }
        .boxed()
    }

    fn add_record(
        &self,
        key: RoomKey,
        user: UserId,
        record: GameplayRecord,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let pool = self.pool.clone();
        async move {
            sqlx::query(
                "INSERT INTO records(user_id, client_id, room_id, ts, duration)
                 VALUES($1, $2, $3, $4, $5)
                 ON CONFLICT DO NOTHING",
            )
            .bind(user.to_string())
            .bind(key.client_id.to_string())
            .bind(key.room_id.to_string())
            .bind(end_timestamp(&record))
            .bind(record.duration)
            .execute(&pool)
            .await
            .map_err(|source| PostgresDaoError::query("add_record", source))?;
            Ok(())
        }
        .boxed()
    }

    fn place_for_duration(
        &self,
        key: RoomKey,
        duration: i64,
    ) -> BoxFuture<'static, StorageResult<i64>> {
        let pool = self.pool.clone();
        async move {
            let place: i64 = sqlx::query_scalar(
                "SELECT COUNT(DISTINCT duration) + 1
                 FROM records
                 WHERE client_id = $1 AND room_id = $2 AND duration > $3",
            )
            .bind(key.client_id.to_string())
            .bind(key.room_id.to_string())
            .bind(duration)
            .fetch_one(&pool)
            .await
            .map_err(|source| PostgresDaoError::query("place_for_duration", source))?;
            Ok(place)
        }
        .boxed()
    }

    fn user_place(&self, key: RoomKey, user: UserId) -> BoxFuture<'static, StorageResult<i64>> {
        let pool = self.pool.clone();
        async move {
            let place: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) + 1
                 FROM records
                 WHERE client_id = $1 AND room_id = $2 AND duration > (
                     SELECT COALESCE(MAX(duration), 0)
                     FROM records
                     WHERE client_id = $1 AND room_id = $2 AND user_id = $3
                 )",
            )
            .bind(key.client_id.to_string())
            .bind(key.room_id.to_string())
            .bind(user.to_string())
            .fetch_one(&pool)
            .await
            .map_err(|source| PostgresDaoError::query("user_place", source))?;
            Ok(place)
        }
        .boxed()
    }

    fn count_users(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>> {
        let pool = self.pool.clone();
        async move {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(DISTINCT user_id)
                 FROM records
                 WHERE client_id = $1 AND room_id = $2 AND duration > 0",
            )
            .bind(key.client_id.to_string())
            .bind(key.room_id.to_string())
            .fetch_one(&pool)
            .await
            .map_err(|source| PostgresDaoError::query("count_users", source))?;
            Ok(count)
        }
        .boxed()
    }

    fn best_overall(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>> {
        let pool = self.pool.clone();
        async move {
            let best: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(duration), 0)
                 FROM records
                 WHERE client_id = $1 AND room_id = $2 AND duration > 0",
            )
            .bind(key.client_id.to_string())
            .bind(key.room_id.to_string())
            .fetch_one(&pool)
            .await
            .map_err(|source| PostgresDaoError::query("best_overall", source))?;
            Ok(best)
        }
        .boxed()
    }

    fn best_today(&self, key: RoomKey) -> BoxFuture<'static, StorageResult<i64>> {
        let pool = self.pool.clone();
        async move {
            let best: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(duration), 0)
                 FROM records
                 WHERE client_id = $1 AND room_id = $2 AND ts >= $3",
            )
            .bind(key.client_id.to_string())
            .bind(key.room_id.to_string())
            .bind(start_of_utc_day())
            .fetch_one(&pool)
            .await
            .map_err(|source| PostgresDaoError::query("best_today", source))?;
            Ok(best)
        }
        .boxed()
    }
}
