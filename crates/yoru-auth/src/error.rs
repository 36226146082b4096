//! Auth errors

use yoru_core::StoreError;

/// Failure reported by an [`AuthApi`](crate::AuthApi) implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Server answered and said no; the message is shown to the user as-is
    #[error("{0}")]
    Rejected(String),

    /// Request never got a usable answer
    #[error("network error: {0}")]
    Transport(String),
}

/// Auth flow errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Server rejected the request; displays as the server's message
    #[error("{0}")]
    Rejected(String),

    /// Remote call exceeded the request deadline
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Remote call failed below the API
    #[error("{0}")]
    Transport(String),

    /// Session could not be persisted
    #[error("failed to save session: {0}")]
    Storage(#[from] StoreError),

    /// Another auth request is still loading
    #[error("another auth request is in progress")]
    InFlight,

    /// Account creation attempted while a user is signed in
    #[error("already signed in; log out first")]
    SignedIn,
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected(message) => Self::Rejected(message),
            ApiError::Transport(message) => Self::Transport(message),
        }
    }
}

/// Migration errors
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Old and new identity are the same
    #[error("cannot migrate records from {0} to itself")]
    SameIdentity(String),

    /// Rewrite kept failing; the claim is parked for [`Migrator::settle`](crate::Migrator::settle)
    #[error("ownership rewrite failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: yoru_ledger::LedgerError,
    },

    /// Parked claims could not be read or saved
    #[error("pending ownership claims unavailable: {0}")]
    Pending(#[source] StoreError),
}
