//! Data transfer objects: wire protocol frames and request validation.

/// Body of the health probe.
pub mod health;
/// Wire protocol types for gameplay sessions and room stats.
pub mod protocol;
/// Query-parameter validation rules.
pub mod validation;
