/// Init-data signature verification.
pub mod auth;
/// The aggregated OpenAPI document.
pub mod documentation;
/// Store connectivity probes behind `/healthz`.
pub mod health_service;
/// Room control operations (create, delete, stats, restore).
pub mod room_service;
/// WebSocket connection handling and the session wire.
pub mod websocket_service;
