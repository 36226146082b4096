//! Identity resolver
//!
//! [`IdentityResolver::resolve`] yields the guest identity for this
//! installation, asking the host at most once per process.
//! [`IdentityResolver::current`] layers the signed-in account on top.

use crate::host::HostIdentity;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::OnceCell;
use yoru_core::storage::{load_json, save_json};
use yoru_core::{Identity, KeyValueStore};

/// Storage key for the persisted ephemeral fallback
pub const EPHEMERAL_KEY: &str = "identity.ephemeral";

/// Resolves the current actor identity.
///
/// One per process; share it behind an `Arc`.
pub struct IdentityResolver {
    host: Arc<dyn HostIdentity>,
    store: Option<Arc<dyn KeyValueStore>>,
    guest: OnceCell<Identity>,
    account: RwLock<Option<Identity>>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("guest", &self.guest.get())
            .field("account", &*self.account.read())
            .finish_non_exhaustive()
    }
}

impl IdentityResolver {
    /// Resolver with no fallback persistence
    #[must_use]
    pub fn new(host: Arc<dyn HostIdentity>) -> Self {
        Self {
            host,
            store: None,
            guest: OnceCell::new(),
            account: RwLock::new(None),
        }
    }

    /// Persist the ephemeral fallback so the next start can reuse it
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Guest identity for this installation.
    ///
    /// The first call asks the host for a machine fingerprint; every later call
    /// (including concurrent ones) returns the same cached value. Host failure
    /// degrades to an `ephemeral-` identity and is never surfaced.
    pub async fn resolve(&self) -> Identity {
        self.guest.get_or_init(|| self.mint()).await.clone()
    }

    /// Account identity if one is set, else the guest identity
    pub async fn current(&self) -> Identity {
        let account = self.account.read().clone();
        match account {
            Some(account) => account,
            None => self.resolve().await,
        }
    }

    /// Switch the current identity to a signed-in account
    pub fn set_account(&self, identity: Identity) {
        if !identity.is_account() {
            tracing::warn!(%identity, "ignoring non-account identity as account override");
            return;
        }
        tracing::info!(%identity, "current identity switched to account");
        *self.account.write() = Some(identity);
    }

    /// Drop back to the guest identity
    pub fn clear_account(&self) {
        if let Some(previous) = self.account.write().take() {
            tracing::info!(%previous, "account override cleared");
        }
    }

    /// Account override, if any
    #[must_use]
    pub fn account(&self) -> Option<Identity> {
        self.account.read().clone()
    }

    async fn mint(&self) -> Identity {
        match self.host.machine_fingerprint().await {
            Ok(fingerprint) => {
                let identity = Identity::device(fingerprint);
                tracing::info!(%identity, "resolved device identity");
                identity
            }
            Err(e) => {
                tracing::warn!(error = %e, "host identity unavailable, using ephemeral identity");
                self.ephemeral().await
            }
        }
    }

    async fn ephemeral(&self) -> Identity {
        let Some(store) = &self.store else {
            return Identity::ephemeral();
        };

        match load_json::<Identity>(store.as_ref(), EPHEMERAL_KEY).await {
            Ok(Some(saved)) if saved.is_ephemeral() => {
                tracing::debug!(identity = %saved, "reusing persisted ephemeral identity");
                return saved;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "discarding unreadable ephemeral identity"),
        }

        let fresh = Identity::ephemeral();
        if let Err(e) = save_json(store.as_ref(), EPHEMERAL_KEY, &fresh).await {
            tracing::warn!(error = %e, "failed to persist ephemeral identity");
        }
        fresh
    }
}
