//! Opaque pagination cursors
//!
//! A cursor is the URL-safe base64 of the JSON continuation key (the sort key
//! of the last item on the page). Clients pass it back unmodified.

use crate::error::LedgerError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Continuation key: query results are ordered by `(date, id)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContinuationKey {
    pub date: NaiveDate,
    pub id: Uuid,
}

impl ContinuationKey {
    /// Encode as an opaque cursor string
    #[must_use]
    pub fn encode(&self) -> String {
        // Serializing two plain fields cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a cursor string
    ///
    /// # Errors
    /// - `LedgerError::InvalidCursor` if it is not base64 of a key
    pub fn decode(cursor: &str) -> Result<Self, LedgerError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|_| LedgerError::InvalidCursor)?;
        serde_json::from_slice(&bytes).map_err(|_| LedgerError::InvalidCursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_what_was_encoded() {
        let key = ContinuationKey {
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            id: Uuid::new_v4(),
        };
        let cursor = key.encode();
        assert!(!cursor.contains('='));
        assert_eq!(ContinuationKey::decode(&cursor).unwrap(), key);
    }

    #[test]
    fn tampered_cursor_rejected() {
        assert!(matches!(
            ContinuationKey::decode("not base64!"),
            Err(LedgerError::InvalidCursor)
        ));
        let not_a_key = URL_SAFE_NO_PAD.encode(b"{\"date\":1}");
        assert!(matches!(
            ContinuationKey::decode(&not_a_key),
            Err(LedgerError::InvalidCursor)
        ));
    }
}
