use redis::RedisError;
use thiserror::Error;

use crate::dao::storage::StorageError;

pub type RedisResult<T> = Result<T, RedisDaoError>;

#[derive(Debug, Error)]
pub enum RedisDaoError {
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to open Redis connection")]
    Connect {
        #[source]
        source: RedisError,
    },
    #[error("Redis ping failed during initial connection")]
    InitialPing {
        #[source]
        source: RedisError,
    },
    #[error("Redis command `{op}` failed")]
    Command {
        op: &'static str,
        #[source]
        source: RedisError,
    },
}

impl RedisDaoError {
    pub fn command(op: &'static str, source: RedisError) -> Self {
        RedisDaoError::Command { op, source }
    }
}

impl From<RedisDaoError> for StorageError {
    fn from(err: RedisDaoError) -> Self {
        match err {
            RedisDaoError::Command { op, source } => StorageError::command(op, source),
            other => StorageError::connection(other.to_string(), other),
        }
    }
}
