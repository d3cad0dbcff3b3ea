// PassGuard — Top-level error taxonomy
//
// Policy and service layers raise these typed conditions; the gateway maps
// each variant to a wire error code. Anything not in the taxonomy surfaces
// as `Internal` with a generic message so internal detail never leaks.

use thiserror::Error;

use crate::store::StoreError;

/// Typed failure conditions for all PassGuard operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(email) => {
                Error::Conflict(format!("Email already registered: {}", email))
            }
            StoreError::NotFound(what) => Error::NotFound(what),
            other => Error::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_email_maps_to_conflict() {
        let err: Error = StoreError::DuplicateEmail("a@b.test".to_string()).into();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(err.to_string().contains("a@b.test"));
    }

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: Error = StoreError::NotFound("System not found".to_string()).into();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_other_store_errors_map_to_internal() {
        let err: Error = StoreError::Other("disk on fire".to_string()).into();
        assert!(matches!(err, Error::Internal(_)));
    }
}
