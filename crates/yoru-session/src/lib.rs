//! Yorutsuke session persistence
//!
//! - [`SessionStore`]: load / save / clear of tokens and profile
//! - [`SessionWriter`]: supervised background writes with retry

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod store;
pub mod writer;

pub use store::{SessionStore, PROFILE_KEY, TOKENS_KEY};
pub use writer::{RetryPolicy, SaveRequest, SessionWriter, WriterError};
