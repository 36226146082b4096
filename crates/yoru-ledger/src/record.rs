//! Transaction records as held by the remote store

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use yoru_core::Identity;

/// Stored transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Uuid,
    pub owner: Identity,
    pub date: NaiveDate,
    /// Minor currency units; negative for expenses
    pub amount: i64,
    pub merchant: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Starts at 1, +1 per accepted update
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub owner: Identity,
    pub date: NaiveDate,
    pub amount: i64,
    pub merchant: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
}

impl NewTransaction {
    #[must_use]
    pub fn new(owner: Identity, date: NaiveDate, amount: i64, merchant: impl Into<String>) -> Self {
        Self {
            owner,
            date,
            amount,
            merchant: merchant.into(),
            category: "other".to_string(),
            description: String::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TransactionPatch {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.amount.is_none()
            && self.merchant.is_none()
            && self.category.is_none()
            && self.description.is_none()
    }

    #[inline]
    #[must_use]
    pub fn amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    #[inline]
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Copy set fields onto `record`
    pub(crate) fn apply_to(self, record: &mut TransactionRecord) {
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(amount) = self.amount {
            record.amount = amount;
        }
        if let Some(merchant) = self.merchant {
            record.merchant = merchant;
        }
        if let Some(category) = self.category {
            record.category = category;
        }
        if let Some(description) = self.description {
            record.description = description;
        }
    }
}
