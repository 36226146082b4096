//! Yorutsuke ledger
//!
//! - [`TransactionStore`]: version-stamped records with an optimistic-lock
//!   update and cursor-paged owner/date queries
//! - [`LocalLedger`]: this machine's captured transactions, bulk-reassignable
//!   from a guest owner to an account
//! - [`ReceiptImage`]: content-hashed receipt images; one record per image
//! - [`api::routes`]: the store over HTTP
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use yoru_core::Identity;
//! use yoru_ledger::{NewTransaction, TransactionPatch, TransactionStore};
//!
//! let store = TransactionStore::new();
//! let date = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
//! let record = store
//!     .create(NewTransaction::new(Identity::account("42"), date, -980, "Lawson"))
//!     .unwrap();
//!
//! let patch = TransactionPatch::default().amount(-1080);
//! let updated = store.update(record.id, patch.clone(), Some(record.version)).unwrap();
//! assert_eq!(updated.version, 2);
//!
//! // Same expected version again: rejected, nothing written
//! assert!(store.update(record.id, patch, Some(1)).unwrap_err().is_conflict());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod api;
pub mod cursor;
pub mod error;
pub mod image;
pub mod local;
pub mod record;
pub mod store;

pub use cursor::ContinuationKey;
pub use error::LedgerError;
pub use image::{delete_image, image_hash, ReceiptImage};
pub use local::{LocalLedger, LocalTransaction, LEDGER_KEY};
pub use record::{NewTransaction, TransactionPatch, TransactionRecord};
pub use store::{Page, Query, TransactionStore, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
