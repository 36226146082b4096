//! Yorutsuke auth
//!
//! - [`AuthService`]: the auth state machine (register, verify, login, logout,
//!   token refresh, error recovery, startup restore)
//! - [`AuthApi`]: remote auth seam, with [`HttpAuthApi`] as the HTTP client
//! - [`Migrator`]: moves guest-owned local records to the account after a
//!   login that claimed them

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod api;
pub mod error;
pub mod http;
pub mod migrator;
pub mod service;

#[cfg(test)]
mod testing;

pub use api::{AuthApi, LoginData, RefreshData};
pub use error::{ApiError, AuthError, MigrationError};
pub use http::HttpAuthApi;
pub use migrator::{Migrator, PENDING_KEY};
pub use service::AuthService;
