use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Errors raised by the gameplay session engine.
///
/// Validation variants are client-induced and terminate only the offending
/// session; transport variants mean the socket is gone; `Store` wraps backing
/// store failures collected during best-effort cleanup.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("game session is already in progress")]
    SessionExists,
    #[error("invalid game session update: invalid push timestamp: {expected} != {got}")]
    InvalidPushTimestamp { expected: i64, got: i64 },
    #[error("invalid game session update: invalid hold duration: {server} > {client}")]
    InvalidHoldDuration { server: i64, client: i64 },
    #[error("invalid game session update: invalid button phase")]
    InvalidButtonPhase,
    #[error("failed to read the game session update")]
    ReadFailed,
    #[error("failed to write the game session message")]
    WriteFailed,
    #[error(transparent)]
    Store(#[from] StorageError),
    #[error("{0}")]
    Joined(JoinedErrors),
}

impl GameError {
    /// True for errors the client caused, as opposed to infrastructure faults.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GameError::SessionExists
                | GameError::InvalidPushTimestamp { .. }
                | GameError::InvalidHoldDuration { .. }
                | GameError::InvalidButtonPhase
        )
    }

    /// Join a batch of errors into one, preserving every message.
    ///
    /// Returns `None` when the batch is empty and unwraps singleton batches,
    /// so the joined form only appears when more than one error accumulated.
    pub fn join(errors: Vec<GameError>) -> Option<GameError> {
        let mut errors = errors;
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(GameError::Joined(JoinedErrors(errors))),
        }
    }
}

/// Several errors collected across a best-effort sequence.
#[derive(Debug)]
pub struct JoinedErrors(pub Vec<GameError>);

impl std::fmt::Display for JoinedErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// Errors surfaced by the HTTP control endpoints.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
