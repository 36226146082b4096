//! Local ledger
//!
//! Transactions captured on this machine, tagged with the identity that owned
//! them at capture time. The whole ledger is one stored document, so an owner
//! rewrite is a single bulk write rather than one write per record.

use crate::error::LedgerError;
use crate::image::{delete_image, ReceiptImage};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use yoru_core::storage::{load_json, save_json};
use yoru_core::{Identity, KeyValueStore};

/// Storage key of the ledger document
pub const LEDGER_KEY: &str = "ledger.transactions";

/// Locally held transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTransaction {
    pub id: String,
    pub owner: Identity,
    pub date: NaiveDate,
    pub amount: i64,
    pub merchant: String,
    pub category: String,
    /// Receipt image this was extracted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ReceiptImage>,
    pub created_at: DateTime<Utc>,
}

impl LocalTransaction {
    #[must_use]
    pub fn new(owner: Identity, date: NaiveDate, amount: i64, merchant: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner,
            date,
            amount,
            merchant: merchant.into(),
            category: "other".to_string(),
            image: None,
            created_at: Utc::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_image(mut self, image: ReceiptImage) -> Self {
        self.image = Some(image);
        self
    }

    fn image_hash(&self) -> Option<&str> {
        self.image.as_ref().map(|image| image.hash.as_str())
    }
}

/// Durable local ledger.
///
/// Read-modify-write cycles are serialized by an internal mutex so a bulk
/// rewrite never interleaves with an insert.
#[derive(Debug)]
pub struct LocalLedger {
    store: Arc<dyn KeyValueStore>,
    write: Mutex<()>,
}

impl LocalLedger {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write: Mutex::new(()),
        }
    }

    /// Add a record
    ///
    /// # Errors
    /// - `LedgerError::DuplicateImage` if a held record came from the same image
    pub async fn insert(&self, record: LocalTransaction) -> Result<(), LedgerError> {
        let _guard = self.write.lock().await;
        let mut all = self.load_all().await?;
        if let Some(hash) = record.image_hash() {
            if all.iter().any(|r| r.image_hash() == Some(hash)) {
                return Err(LedgerError::DuplicateImage(hash.to_string()));
            }
        }
        all.push(record);
        self.save_all(&all).await
    }

    /// Whether any held record came from the image with this hash
    pub async fn has_image(&self, hash: &str) -> Result<bool, LedgerError> {
        Ok(self
            .load_all()
            .await?
            .iter()
            .any(|r| r.image_hash() == Some(hash)))
    }

    /// Records owned by `owner`, oldest date first
    pub async fn list_by_owner(&self, owner: &Identity) -> Result<Vec<LocalTransaction>, LedgerError> {
        let mut mine: Vec<_> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|r| &r.owner == owner)
            .collect();
        mine.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(mine)
    }

    /// Number of records owned by `owner`
    pub async fn count_by_owner(&self, owner: &Identity) -> Result<usize, LedgerError> {
        Ok(self
            .load_all()
            .await?
            .iter()
            .filter(|r| &r.owner == owner)
            .count())
    }

    /// Rewrite every record owned by `old` to `new` in one write.
    ///
    /// Returns how many were rewritten; zero means nothing was written.
    pub async fn reassign_owner(&self, old: &Identity, new: &Identity) -> Result<usize, LedgerError> {
        let _guard = self.write.lock().await;
        let mut all = self.load_all().await?;

        let mut moved = 0;
        for record in all.iter_mut().filter(|r| &r.owner == old) {
            record.owner = new.clone();
            moved += 1;
        }

        if moved > 0 {
            self.save_all(&all).await?;
        }
        Ok(moved)
    }

    /// Remove a record by id, deleting its local receipt image
    ///
    /// An image that cannot be deleted is logged; the record is still removed.
    pub async fn remove(&self, id: &str) -> Result<LocalTransaction, LedgerError> {
        let _guard = self.write.lock().await;
        let mut all = self.load_all().await?;
        let index = all
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        let removed = all.remove(index);
        self.save_all(&all).await?;

        if let Some(image) = &removed.image {
            match delete_image(&image.path).await {
                Ok(true) => tracing::debug!(path = %image.path.display(), "receipt image deleted"),
                Ok(false) => {}
                Err(e) => tracing::warn!(id, error = %e, "failed to delete receipt image"),
            }
        }
        Ok(removed)
    }

    async fn load_all(&self) -> Result<Vec<LocalTransaction>, LedgerError> {
        Ok(load_json(self.store.as_ref(), LEDGER_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save_all(&self, all: &[LocalTransaction]) -> Result<(), LedgerError> {
        Ok(save_json(self.store.as_ref(), LEDGER_KEY, all).await?)
    }
}
