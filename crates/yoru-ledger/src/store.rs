//! Version-stamped transaction store
//!
//! Every accepted update bumps `version` by exactly one and stamps
//! `updated_at` in the same step as the field changes. An update that names an
//! `expected_version` is applied only if it matches the stored version; the
//! compare and the write happen under the record's shard lock, so two
//! updates racing on the same version cannot both succeed.

use crate::cursor::ContinuationKey;
use crate::error::LedgerError;
use crate::record::{NewTransaction, TransactionPatch, TransactionRecord};
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;
use yoru_core::Identity;

/// Page size when the caller gives none
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Largest page a caller may ask for
pub const MAX_PAGE_SIZE: usize = 100;

/// One page of query results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<TransactionRecord>,
    /// Present when more results follow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Owner + date-range query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub owner: Identity,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

impl Query {
    /// All records of `owner` dated within `start..=end`
    #[must_use]
    pub fn new(owner: Identity, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            owner,
            start,
            end,
            limit: None,
            cursor: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[inline]
    #[must_use]
    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

/// In-process transaction store
#[derive(Debug, Default)]
pub struct TransactionStore {
    records: DashMap<Uuid, TransactionRecord>,
}

impl TransactionStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert a new record at version 1
    pub fn create(&self, new: NewTransaction) -> Result<TransactionRecord, LedgerError> {
        if new.merchant.trim().is_empty() {
            return Err(LedgerError::InvalidRequest("merchant is required".into()));
        }

        let now = Utc::now();
        let record = TransactionRecord {
            id: Uuid::new_v4(),
            owner: new.owner,
            date: new.date,
            amount: new.amount,
            merchant: new.merchant,
            category: new.category,
            description: new.description,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.records.insert(record.id, record.clone());
        tracing::debug!(id = %record.id, owner = %record.owner, "transaction created");
        Ok(record)
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<TransactionRecord> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    /// Apply `patch` to record `id`.
    ///
    /// With `expected_version`, the write happens only if it equals the stored
    /// version. Without it the write is unconditional (last-write-wins), which
    /// only trusted internal callers should rely on.
    ///
    /// # Errors
    /// - `LedgerError::NotFound` if no such record
    /// - `LedgerError::Conflict` on version mismatch; the record is untouched
    /// - `LedgerError::InvalidRequest` for an empty patch
    pub fn update(
        &self,
        id: Uuid,
        patch: TransactionPatch,
        expected_version: Option<u64>,
    ) -> Result<TransactionRecord, LedgerError> {
        if patch.is_empty() {
            return Err(LedgerError::InvalidRequest("patch has no fields".into()));
        }

        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        let record = entry.value_mut();

        match expected_version {
            Some(expected) if expected != record.version => {
                tracing::debug!(%id, expected, actual = record.version, "update rejected: stale version");
                return Err(LedgerError::Conflict {
                    expected,
                    actual: record.version,
                });
            }
            Some(_) => {}
            None => tracing::debug!(%id, "unguarded update (no expected version)"),
        }

        patch.apply_to(record);
        record.version += 1;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    /// Remove record `id` unconditionally
    pub fn delete(&self, id: Uuid) -> Result<TransactionRecord, LedgerError> {
        self.records
            .remove(&id)
            .map(|(_, record)| record)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// One page of `query.owner`'s records in `start..=end`, ordered by `(date, id)`
    ///
    /// # Errors
    /// - `LedgerError::InvalidCursor` for a cursor this store did not issue
    /// - `LedgerError::InvalidRequest` if `start > end`
    pub fn query(&self, query: &Query) -> Result<Page, LedgerError> {
        if query.start > query.end {
            return Err(LedgerError::InvalidRequest("start is after end".into()));
        }
        let after = query
            .cursor
            .as_deref()
            .map(ContinuationKey::decode)
            .transpose()?;
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let mut matching: Vec<TransactionRecord> = self
            .records
            .iter()
            .filter(|r| {
                r.owner == query.owner && r.date >= query.start && r.date <= query.end
            })
            .map(|r| r.value().clone())
            .filter(|r| after.map_or(true, |key| key_of(r) > key))
            .collect();
        matching.sort_by_key(key_of);

        let cursor = if matching.len() > limit {
            matching.truncate(limit);
            matching.last().map(|r| key_of(r).encode())
        } else {
            None
        };

        Ok(Page {
            items: matching,
            cursor,
        })
    }
}

fn key_of(record: &TransactionRecord) -> ContinuationKey {
    ContinuationKey {
        date: record.date,
        id: record.id,
    }
}
