//! Error types for Yorutsuke Core
//!
//! Covers:
//! - Identity string parsing
//! - Durable key-value storage
//! - Auth state transitions
//! - Configuration loading
//! - Daily log sink IO

use crate::auth_state::AuthStatus;
use std::path::PathBuf;

/// Identity string could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityParseError {
    /// Prefix is not one of `device-`, `ephemeral-`, `user-`
    #[error("unknown identity prefix: '{0}'")]
    UnknownPrefix(String),

    /// Prefix present but nothing after it
    #[error("identity '{0}' has an empty body")]
    EmptyBody(String),
}

/// Durable storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Key contains characters that cannot be mapped onto storage
    #[error("invalid storage key: '{0}'")]
    InvalidKey(String),

    /// Stored value failed to decode
    #[error("corrupt value under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Value failed to encode
    #[error("failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO error on the backing medium
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backend refused or failed the operation
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Illegal auth state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal auth transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: AuthStatus,
    pub to: AuthStatus,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::AppConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value parsed but is out of range
    #[error("invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Daily log sink errors
#[derive(Debug, thiserror::Error)]
pub enum LogSinkError {
    /// Entry could not be serialized
    #[error("failed to serialize log entry: {0}")]
    Serialize(#[from] serde_json::Error),

    /// IO error on the log directory or file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_parse_error_display() {
        let err = IdentityParseError::UnknownPrefix("guest-1".to_string());
        assert!(err.to_string().contains("guest-1"));
    }

    #[test]
    fn transition_error_display() {
        let err = TransitionError {
            from: AuthStatus::Idle,
            to: AuthStatus::Error,
        };
        assert_eq!(err.to_string(), "illegal auth transition: Idle -> Error");
    }
}
