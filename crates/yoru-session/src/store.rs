//! Session store
//!
//! Tokens and profile live under separate keys so a login can persist them as
//! two ordered steps. A session exists only when both are present and decode.

use std::sync::Arc;
use yoru_core::storage::{load_json, save_json};
use yoru_core::{KeyValueStore, Profile, Session, StoreError, Tokens};

/// Storage key for tokens
pub const TOKENS_KEY: &str = "auth.tokens";
/// Storage key for the profile
pub const PROFILE_KEY: &str = "auth.profile";

/// Persists and restores the authenticated session
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored session, or `None`.
    ///
    /// Missing, partial and corrupt data all read as "no session".
    pub async fn load(&self) -> Option<Session> {
        let tokens = self.load_tokens().await?;
        let profile = self.load_profile().await?;
        Some(Session { tokens, profile })
    }

    /// Stored tokens alone
    pub async fn load_tokens(&self) -> Option<Tokens> {
        self.load_key(TOKENS_KEY).await
    }

    /// Stored profile alone
    pub async fn load_profile(&self) -> Option<Profile> {
        self.load_key(PROFILE_KEY).await
    }

    /// Persist tokens then profile
    pub async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.save_tokens(&session.tokens).await?;
        self.save_profile(&session.profile).await
    }

    pub async fn save_tokens(&self, tokens: &Tokens) -> Result<(), StoreError> {
        save_json(self.store.as_ref(), TOKENS_KEY, tokens).await
    }

    pub async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        save_json(self.store.as_ref(), PROFILE_KEY, profile).await
    }

    /// Remove tokens and profile.
    ///
    /// Both removals are attempted; the first failure is returned.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let tokens = self.store.remove(TOKENS_KEY).await;
        let profile = self.store.remove(PROFILE_KEY).await;
        tokens.and(profile)
    }

    async fn load_key<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match load_json(self.store.as_ref(), key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "treating unreadable session data as absent");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use yoru_core::{FileStore, Identity, MemoryStore, Tier};

    fn session() -> Session {
        Session {
            tokens: Tokens {
                access_token: "at".into(),
                refresh_token: "rt".into(),
                id_token: "it".into(),
            },
            profile: Profile::new(Identity::account("42"), "a@x.com", Tier::Pro),
        }
    }

    #[tokio::test]
    async fn empty_store_has_no_session() {
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        assert!(sessions.load().await.is_none());
    }

    #[tokio::test]
    async fn save_load_clear() {
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        sessions.save(&session()).await.unwrap();
        assert_eq!(sessions.load().await, Some(session()));

        sessions.clear().await.unwrap();
        assert!(sessions.load().await.is_none());
        assert!(sessions.load_tokens().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_profile_reads_as_no_session() {
        let kv = Arc::new(MemoryStore::new());
        let sessions = SessionStore::new(kv.clone());
        sessions.save(&session()).await.unwrap();
        kv.set(PROFILE_KEY, "{\"id\":\"nobody\"".into()).await.unwrap();

        assert!(sessions.load().await.is_none());
        assert!(sessions.load_tokens().await.is_some());
    }

    #[tokio::test]
    async fn tokens_without_profile_is_no_session() {
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        sessions.save_tokens(&session().tokens).await.unwrap();
        assert!(sessions.load().await.is_none());
    }

    #[tokio::test]
    async fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let first = SessionStore::new(Arc::new(FileStore::open(dir.path()).await.unwrap()));
        first.save(&session()).await.unwrap();

        let second = SessionStore::new(Arc::new(FileStore::open(dir.path()).await.unwrap()));
        assert_eq!(second.load().await, Some(session()));
    }
}
