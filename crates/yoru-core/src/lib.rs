//! Yorutsuke Core
//!
//! Shared vocabulary for the identity, session and ledger crates:
//! - [`Identity`]: guest (device / ephemeral) or account identities
//! - [`Session`] and [`Profile`]: what a successful login leaves behind
//! - [`AuthState`]: the auth state machine and its legal transitions
//! - [`KeyValueStore`]: the durable local storage seam
//! - [`NotificationBus`]: process-wide broadcast of cross-module signals
//! - [`AppConfig`]: TOML-backed configuration
//! - [`DailyLogSink`]: dated JSONL log files with retention cleanup
//!
//! # Example
//!
//! ```rust
//! use yoru_core::Identity;
//!
//! let guest: Identity = "device-abc123".parse().unwrap();
//! assert!(guest.is_guest());
//!
//! let account = Identity::account("42");
//! assert_eq!(account.to_string(), "user-42");
//! assert!(!account.is_guest());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod auth_state;
pub mod bus;
pub mod config;
pub mod error;
pub mod identity;
pub mod logsink;
pub mod storage;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use auth_state::{allowed_transitions, validate_transition, AuthState, AuthStatus};
pub use bus::{Notification, NotificationBus, OwnershipClaim};
pub use config::{AppConfig, AuthConfig, LoggingConfig, StorageConfig};
pub use error::{ConfigError, IdentityParseError, LogSinkError, StoreError, TransitionError};
pub use identity::Identity;
pub use logsink::{DailyLogSink, LogEntry};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{Profile, Session, Tier, Tokens};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Yorutsuke core types
    pub use crate::{
        AppConfig, AuthState, AuthStatus, Identity, KeyValueStore, Notification,
        NotificationBus, OwnershipClaim, Profile, Session, Tier, Tokens,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
