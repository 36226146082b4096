//! Test doubles shared across the workspace
//!
//! Compiled for this crate's own tests and, for other crates, behind the
//! `testing` feature.

use crate::error::StoreError;
use crate::storage::{KeyValueStore, MemoryStore};
use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Memory store whose writes can be made to fail.
///
/// Failures can be switched on for every write, for chosen keys, or for the
/// next `n` writes only. Reads always succeed.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
    failing_keys: DashSet<String>,
    fail_next: AtomicU32,
}

impl FlakyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write while `fail` is set
    pub fn fail_writes(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    /// Fail writes to `key` only
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.insert(key.to_string());
    }

    /// Fail the next `n` writes, whatever their key
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        self.failing.store(false, Ordering::SeqCst);
        self.failing_keys.clear();
        self.fail_next.store(0, Ordering::SeqCst);
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        let counted = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if counted || self.failing.load(Ordering::SeqCst) || self.failing_keys.contains(key) {
            Err(StoreError::Backend(format!("injected write failure on {key}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.remove(key).await
    }
}
