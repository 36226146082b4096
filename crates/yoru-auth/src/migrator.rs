//! Guest data ownership migration
//!
//! When a login reports that the server claimed this guest's records, the local
//! copies are rewritten from the guest identity to the account identity in one
//! bulk write and an [`OwnershipClaim`] is broadcast so views re-fetch.
//!
//! A rewrite that keeps failing is parked in durable storage under
//! [`PENDING_KEY`] rather than lost, so it survives the process. Readers call
//! [`Migrator::settle`] (or read through [`Migrator::list_for`]) so records never
//! appear to vanish between the identity switch and the rewrite.

use crate::error::MigrationError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use yoru_core::storage::{load_json, save_json};
use yoru_core::{Identity, KeyValueStore, Notification, NotificationBus, OwnershipClaim};
use yoru_ledger::{LedgerError, LocalLedger, LocalTransaction};

/// Storage key of claims whose rewrite has not landed yet
pub const PENDING_KEY: &str = "ownership.pending";

/// Pause between rewrite attempts
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Rewrites local record ownership after a claim
#[derive(Debug)]
pub struct Migrator {
    ledger: Arc<LocalLedger>,
    store: Arc<dyn KeyValueStore>,
    bus: NotificationBus,
    attempts: u32,
    parked: Mutex<()>,
}

impl Migrator {
    /// `store` holds parked claims; `attempts` is the total number of rewrite
    /// tries per migration (at least one)
    #[must_use]
    pub fn new(
        ledger: Arc<LocalLedger>,
        store: Arc<dyn KeyValueStore>,
        bus: NotificationBus,
        attempts: u32,
    ) -> Self {
        Self {
            ledger,
            store,
            bus,
            attempts: attempts.max(1),
            parked: Mutex::new(()),
        }
    }

    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &Arc<LocalLedger> {
        &self.ledger
    }

    /// Move every local record owned by `old` to `new`, then broadcast the claim.
    ///
    /// `count` is the server-reported number and is what the notification
    /// carries. Calling again with the same pair rewrites nothing.
    ///
    /// # Errors
    /// - `MigrationError::SameIdentity` if `old == new`
    /// - `MigrationError::Exhausted` if every attempt failed; the claim is parked
    /// - `MigrationError::Pending` if it failed and could not be parked either
    pub async fn migrate(&self, old: &Identity, new: &Identity, count: u64) -> Result<usize, MigrationError> {
        if old == new {
            return Err(MigrationError::SameIdentity(old.to_string()));
        }
        let claim = OwnershipClaim {
            count,
            old_identity: old.clone(),
            new_identity: new.clone(),
        };

        let _parked = self.parked.lock().await;
        match self.rewrite(&claim).await {
            Ok(moved) => {
                self.unpark(&claim).await;
                self.announce(claim, moved);
                Ok(moved)
            }
            Err(source) => {
                tracing::error!(%old, %new, attempts = self.attempts, error = %source, "ownership rewrite failed, parking claim");
                let mut parked = self.load_parked().await?;
                if !parked.contains(&claim) {
                    parked.push(claim);
                }
                self.save_parked(&parked).await?;
                Err(MigrationError::Exhausted {
                    attempts: self.attempts,
                    source,
                })
            }
        }
    }

    /// Retry every parked claim, oldest first.
    ///
    /// Returns how many were applied. Claims that fail again stay parked.
    ///
    /// # Errors
    /// - `MigrationError::Exhausted` if any claim failed again
    /// - `MigrationError::Pending` if the parked list could not be read or saved
    pub async fn settle(&self) -> Result<usize, MigrationError> {
        let _parked = self.parked.lock().await;
        let parked = self.load_parked().await?;
        if parked.is_empty() {
            return Ok(0);
        }

        let mut settled = Vec::new();
        let mut remaining = Vec::new();
        let mut failure = None;
        for claim in parked {
            match self.rewrite(&claim).await {
                Ok(moved) => settled.push((claim, moved)),
                Err(e) => {
                    tracing::warn!(old = %claim.old_identity, new = %claim.new_identity, error = %e, "parked ownership claim still failing");
                    failure.get_or_insert(e);
                    remaining.push(claim);
                }
            }
        }
        self.save_parked(&remaining).await?;

        let applied = settled.len();
        for (claim, moved) in settled {
            tracing::info!(old = %claim.old_identity, new = %claim.new_identity, "parked ownership claim settled");
            self.announce(claim, moved);
        }
        match failure {
            Some(source) => Err(MigrationError::Exhausted {
                attempts: self.attempts,
                source,
            }),
            None => Ok(applied),
        }
    }

    /// Claims still waiting to be applied, oldest first
    ///
    /// # Errors
    /// - `MigrationError::Pending` if the parked list could not be read
    pub async fn pending(&self) -> Result<Vec<OwnershipClaim>, MigrationError> {
        self.load_parked().await
    }

    /// Local records of `owner`, after settling any parked claim
    pub async fn list_for(&self, owner: &Identity) -> Result<Vec<LocalTransaction>, LedgerError> {
        if let Err(e) = self.settle().await {
            tracing::warn!(error = %e, "reading local records with an unsettled ownership claim");
        }
        self.ledger.list_by_owner(owner).await
    }

    async fn rewrite(&self, claim: &OwnershipClaim) -> Result<usize, LedgerError> {
        let mut attempt = 1;
        loop {
            match self
                .ledger
                .reassign_owner(&claim.old_identity, &claim.new_identity)
                .await
            {
                Ok(moved) => return Ok(moved),
                Err(e) if attempt < self.attempts => {
                    tracing::warn!(attempt, error = %e, "ownership rewrite attempt failed");
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Drop `claim` from the parked list if an earlier attempt left it there
    async fn unpark(&self, claim: &OwnershipClaim) {
        let result = match self.load_parked().await {
            Ok(mut parked) if parked.contains(claim) => {
                parked.retain(|c| c != claim);
                self.save_parked(&parked).await
            }
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "applied claim may be retried by the next settle");
        }
    }

    async fn load_parked(&self) -> Result<Vec<OwnershipClaim>, MigrationError> {
        Ok(load_json(self.store.as_ref(), PENDING_KEY)
            .await
            .map_err(MigrationError::Pending)?
            .unwrap_or_default())
    }

    async fn save_parked(&self, parked: &[OwnershipClaim]) -> Result<(), MigrationError> {
        let saved = if parked.is_empty() {
            self.store.remove(PENDING_KEY).await
        } else {
            save_json(self.store.as_ref(), PENDING_KEY, parked).await
        };
        saved.map_err(MigrationError::Pending)
    }

    fn announce(&self, claim: OwnershipClaim, moved: usize) {
        tracing::info!(
            old = %claim.old_identity,
            new = %claim.new_identity,
            reported = claim.count,
            rewritten = moved,
            "guest records claimed"
        );
        self.bus.publish(Notification::OwnershipClaimed(claim));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use yoru_core::testing::FlakyStore;
    use yoru_core::MemoryStore;
    use yoru_ledger::LEDGER_KEY;

    async fn seeded(kv: Arc<dyn KeyValueStore>, owner: &Identity, n: u32) -> Arc<LocalLedger> {
        let ledger = Arc::new(LocalLedger::new(kv));
        for d in 1..=n {
            let date = NaiveDate::from_ymd_opt(2026, 10, d).unwrap();
            ledger
                .insert(LocalTransaction::new(owner.clone(), date, -300, "Lawson"))
                .await
                .unwrap();
        }
        ledger
    }

    fn migrator(ledger: &Arc<LocalLedger>, kv: Arc<dyn KeyValueStore>, bus: NotificationBus, attempts: u32) -> Migrator {
        Migrator::new(Arc::clone(ledger), kv, bus, attempts)
    }

    #[tokio::test]
    async fn migrate_rewrites_and_broadcasts_once() {
        let guest = Identity::device("abc123");
        let account = Identity::account("42");
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ledger = seeded(kv.clone(), &guest, 3).await;
        let migrator = migrator(&ledger, kv, bus, 3);

        assert_eq!(migrator.migrate(&guest, &account, 3).await.unwrap(), 3);
        assert_eq!(ledger.count_by_owner(&guest).await.unwrap(), 0);
        assert_eq!(ledger.count_by_owner(&account).await.unwrap(), 3);

        let Notification::OwnershipClaimed(claim) = rx.recv().await.unwrap() else {
            panic!("expected a claim notification");
        };
        assert_eq!(claim.count, 3);
        assert_eq!(claim.old_identity, guest);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_migration_rewrites_nothing() {
        let guest = Identity::device("abc123");
        let account = Identity::account("42");
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ledger = seeded(kv.clone(), &guest, 2).await;
        let migrator = migrator(&ledger, kv, NotificationBus::default(), 1);

        migrator.migrate(&guest, &account, 2).await.unwrap();
        assert_eq!(migrator.migrate(&guest, &account, 2).await.unwrap(), 0);
        assert_eq!(ledger.count_by_owner(&account).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn same_identity_rejected() {
        let me = Identity::account("42");
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ledger = seeded(kv.clone(), &me, 0).await;
        let migrator = migrator(&ledger, kv, NotificationBus::default(), 1);
        assert!(matches!(
            migrator.migrate(&me, &me, 1).await,
            Err(MigrationError::SameIdentity(_))
        ));
    }

    #[tokio::test]
    async fn failed_rewrite_is_parked_then_settled() {
        let guest = Identity::device("abc123");
        let account = Identity::account("42");
        let kv = Arc::new(FlakyStore::new());
        let ledger = seeded(kv.clone(), &guest, 2).await;
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();
        let migrator = migrator(&ledger, kv.clone(), bus, 2);

        kv.fail_key(LEDGER_KEY);
        assert!(matches!(
            migrator.migrate(&guest, &account, 2).await,
            Err(MigrationError::Exhausted { attempts: 2, .. })
        ));
        assert_eq!(migrator.pending().await.unwrap().len(), 1);
        assert!(rx.try_recv().is_err());

        kv.heal();
        let mine = migrator.list_for(&account).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(migrator.pending().await.unwrap().is_empty());
        assert!(kv.get(PENDING_KEY).await.unwrap().is_none());
        assert!(matches!(rx.try_recv(), Ok(Notification::OwnershipClaimed(_))));
        assert_eq!(migrator.settle().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn parked_claim_survives_a_new_migrator() {
        let guest = Identity::device("abc123");
        let account = Identity::account("42");
        let kv = Arc::new(FlakyStore::new());
        let ledger = seeded(kv.clone(), &guest, 2).await;

        kv.fail_key(LEDGER_KEY);
        let first = migrator(&ledger, kv.clone(), NotificationBus::default(), 1);
        assert!(first.migrate(&guest, &account, 2).await.is_err());
        drop(first);
        kv.heal();

        let ledger = Arc::new(LocalLedger::new(kv.clone()));
        let second = migrator(&ledger, kv, NotificationBus::default(), 1);
        assert_eq!(second.settle().await.unwrap(), 1);
        assert_eq!(ledger.count_by_owner(&account).await.unwrap(), 2);
        assert_eq!(ledger.count_by_owner(&guest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn later_failure_does_not_replace_earlier_parked_claim() {
        let laptop = Identity::device("laptop");
        let phone = Identity::device("phone");
        let account = Identity::account("42");
        let kv = Arc::new(FlakyStore::new());
        let ledger = seeded(kv.clone(), &laptop, 2).await;
        ledger
            .insert(LocalTransaction::new(phone.clone(), NaiveDate::from_ymd_opt(2026, 10, 9).unwrap(), -120, "Daiso"))
            .await
            .unwrap();
        let migrator = migrator(&ledger, kv.clone(), NotificationBus::default(), 1);

        kv.fail_key(LEDGER_KEY);
        assert!(migrator.migrate(&laptop, &account, 2).await.is_err());
        assert!(migrator.migrate(&phone, &account, 1).await.is_err());
        let parked = migrator.pending().await.unwrap();
        assert_eq!(
            parked.iter().map(|c| c.old_identity.clone()).collect::<Vec<_>>(),
            vec![laptop, phone]
        );

        kv.heal();
        assert_eq!(migrator.settle().await.unwrap(), 2);
        assert_eq!(ledger.count_by_owner(&account).await.unwrap(), 3);
    }
}
