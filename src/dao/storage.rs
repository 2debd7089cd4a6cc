use std::error::Error;
use thiserror::Error;

/// Shorthand used by every store trait method.
pub type StorageResult<T> = Result<T, StorageError>;

type DynError = Box<dyn Error + Send + Sync>;

/// A backing-store failure with the backend specifics erased.
///
/// Session close collects these across every cleanup step instead of
/// stopping at the first one, and the joined report ends up in an error
/// frame, so each variant's text has to stand on its own.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reaching or bootstrapping the backend failed.
    #[error("store connection failed: {0}")]
    Connection(String, #[source] DynError),
    /// One command against an otherwise reachable backend failed.
    #[error("store command `{0}` failed")]
    Command(&'static str, #[source] DynError),
}

impl StorageError {
    /// Erase a connection-level backend failure.
    pub fn connection(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Connection(message, Box::new(source))
    }

    /// Tag a failed command with the name of the operation that ran it.
    pub fn command(op: &'static str, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Command(op, Box::new(source))
    }
}
