//! Ledger errors

use yoru_core::StoreError;

/// Transaction store / local ledger errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// No record with this id
    #[error("transaction not found: {0}")]
    NotFound(String),

    /// Caller's expected version is stale; nothing was written
    #[error("version conflict: expected {expected}, current {actual}")]
    Conflict { expected: u64, actual: u64 },

    /// Cursor was not produced by this store
    #[error("invalid pagination cursor")]
    InvalidCursor,

    /// A record from this receipt image is already held
    #[error("receipt image already recorded: {0}")]
    DuplicateImage(String),

    /// Request is malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Local storage failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// True for optimistic-lock rejections
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// HTTP status this error maps to
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict { .. } | Self::DuplicateImage(_) => 409,
            Self::InvalidCursor | Self::InvalidRequest(_) => 400,
            Self::Store(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_409() {
        let err = LedgerError::Conflict {
            expected: 1,
            actual: 2,
        };
        assert!(err.is_conflict());
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.to_string(), "version conflict: expected 1, current 2");
    }

    #[test]
    fn other_status_codes() {
        assert_eq!(LedgerError::NotFound("x".into()).status_code(), 404);
        assert_eq!(LedgerError::InvalidCursor.status_code(), 400);
        assert!(!LedgerError::InvalidCursor.is_conflict());
    }
}
