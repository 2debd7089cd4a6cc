//! Storage layer: trait contracts plus the Redis and Postgres backends.

/// Per-room ordered chat stream contract.
pub mod chat_stream;
/// Durable leaderboard store contract.
pub mod record_store;
/// Volatile active-session store contract.
pub mod session_store;
/// Backend-agnostic storage errors.
pub mod storage;

/// Redis implementation of the volatile store and chat stream.
pub mod redis;

/// Postgres implementation of the durable record store.
pub mod postgres;

#[cfg(test)]
pub mod memory;
