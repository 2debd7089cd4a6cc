//! Validation helpers for query parameters.

use validator::ValidationError;

/// Longest accepted room identifier, in bytes.
pub const MAX_ROOM_ID_LEN: usize = 36;

/// Validates that a room identifier is non-empty and at most 36 bytes.
pub fn validate_room_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        let mut err = ValidationError::new("room_id_empty");
        err.message = Some("Room id not provided".into());
        return Err(err);
    }

    if id.len() > MAX_ROOM_ID_LEN {
        let mut err = ValidationError::new("room_id_length");
        err.message = Some(
            format!(
                "Room id is too long ({} bytes, limit {MAX_ROOM_ID_LEN})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_short_room_ids() {
        assert!(validate_room_id("peace").is_ok());
        assert!(validate_room_id("r42").is_ok());
    }

    #[test]
    fn boundary_length_is_inclusive() {
        let at_limit = "a".repeat(36);
        let over_limit = "a".repeat(37);
        assert!(validate_room_id(&at_limit).is_ok());
        assert!(validate_room_id(&over_limit).is_err());
    }

    #[test]
    fn rejects_empty_room_id() {
        assert!(validate_room_id("").is_err());
    }
}
