use thiserror::Error;

use crate::dao::storage::StorageError;

pub type PostgresResult<T> = Result<T, PostgresDaoError>;

#[derive(Debug, Error)]
pub enum PostgresDaoError {
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to open Postgres pool")]
    Connect {
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to ensure the records schema")]
    EnsureSchema {
        #[source]
        source: sqlx::Error,
    },
    #[error("Postgres query `{op}` failed")]
    Query {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl PostgresDaoError {
    pub fn query(op: &'static str, source: sqlx::Error) -> Self {
        PostgresDaoError::Query { op, source }
    }
}

impl From<PostgresDaoError> for StorageError {
    fn from(err: PostgresDaoError) -> Self {
        match err {
            PostgresDaoError::Query { op, source } => StorageError::command(op, source),
            other => StorageError::connection(other.to_string(), other),
        }
    }
}
