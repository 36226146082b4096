//! Process-wide notification bus
//!
//! Publish/subscribe over `tokio::sync::broadcast`. Subscribers must not
//! assume any delivery order across topics.

use crate::auth_state::AuthStatus;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel depth before slow subscribers start lagging
pub const DEFAULT_CAPACITY: usize = 64;

/// Guest records reassigned to an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipClaim {
    /// Count reported by the server
    pub count: u64,
    pub old_identity: Identity,
    pub new_identity: Identity,
}

/// Cross-module signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Local records were rewritten from a guest to an account identity
    OwnershipClaimed(OwnershipClaim),
    /// Auth state settled on a new status
    AuthChanged { status: AuthStatus },
    /// A background session write was given up on
    SessionSaveFailed { key: String, error: String },
}

impl Notification {
    /// Topic name for routing / logging
    #[inline]
    #[must_use]
    pub fn topic(&self) -> &'static str {
        match self {
            Self::OwnershipClaimed(_) => "data:claimed",
            Self::AuthChanged { .. } => "auth:changed",
            Self::SessionSaveFailed { .. } => "session:save-failed",
        }
    }
}

/// Broadcast bus; cheap to clone, all clones share one channel
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Notification>,
}

impl NotificationBus {
    /// Create bus with given capacity
    #[inline]
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish; returns how many subscribers received it
    pub fn publish(&self, notification: Notification) -> usize {
        let topic = notification.topic();
        match self.tx.send(notification) {
            Ok(n) => {
                tracing::debug!(topic, receivers = n, "notification published");
                n
            }
            // No subscribers is fine
            Err(_) => {
                tracing::debug!(topic, "notification published with no subscribers");
                0
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
