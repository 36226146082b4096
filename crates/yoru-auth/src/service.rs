//! Auth transition service
//!
//! The only writer of [`AuthState`]. Each operation is one flow whose steps run
//! strictly in order; state is published through a `watch` channel and every
//! status change is also announced on the notification bus.
//!
//! Remote calls are bounded by the configured request deadline, so no flow can
//! leave the machine in `Loading` indefinitely. A flow started while another
//! is still loading is refused with [`AuthError::InFlight`].

use crate::api::AuthApi;
use crate::error::{ApiError, AuthError};
use crate::migrator::Migrator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use yoru_core::{
    validate_transition, AuthConfig, AuthState, AuthStatus, Identity, Notification, NotificationBus, Profile,
    StoreError, Tokens,
};
use yoru_identity::IdentityResolver;
use yoru_session::{SaveRequest, SessionStore, SessionWriter, WriterError};

/// Drives the auth state machine against the remote auth API
pub struct AuthService {
    api: Arc<dyn AuthApi>,
    resolver: Arc<IdentityResolver>,
    sessions: SessionStore,
    migrator: Arc<Migrator>,
    bus: NotificationBus,
    timeout: Duration,
    writer: Option<SessionWriter>,
    state: watch::Sender<AuthState>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("state", &*self.state.borrow())
            .field("timeout", &self.timeout)
            .field("background_writer", &self.writer.is_some())
            .finish_non_exhaustive()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(
        api: Arc<dyn AuthApi>,
        resolver: Arc<IdentityResolver>,
        sessions: SessionStore,
        migrator: Arc<Migrator>,
        bus: NotificationBus,
        config: &AuthConfig,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Idle);
        Self {
            api,
            resolver,
            sessions,
            migrator,
            bus,
            timeout: config.request_timeout(),
            writer: None,
            state,
        }
    }

    /// Route refreshed-token saves and the logout clear through a background
    /// writer. Token saves still wait for their outcome.
    #[must_use]
    pub fn with_background_writer(mut self, writer: SessionWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &Arc<IdentityResolver> {
        &self.resolver
    }

    #[inline]
    #[must_use]
    pub fn migrator(&self) -> &Arc<Migrator> {
        &self.migrator
    }

    /// Restore a stored session, if any. Never fails.
    pub async fn init(&self) {
        match self.sessions.load().await {
            Some(session) => {
                let user = session.profile;
                self.resolver.set_account(user.id.clone());
                tracing::info!(user = %user.id, "restored stored session");
                self.transition(AuthState::Authenticated { user });
            }
            None => {
                tracing::debug!("no stored session");
                self.transition(AuthState::Idle);
            }
        }
    }

    /// Create an account. Success returns to `Idle`; verification comes next.
    ///
    /// # Errors
    /// - `AuthError::InFlight` if another request is loading
    /// - `AuthError::SignedIn` if a user is signed in; state is untouched
    /// - the server rejection, timeout or transport failure
    pub async fn register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let held = self.begin(true)?;
        match self.remote("register", self.api.register(email, password)).await {
            Ok(()) => {
                tracing::info!(email, "registration accepted, awaiting verification");
                self.transition(AuthState::Idle);
                Ok(())
            }
            Err(e) => Err(self.fail(e, held)),
        }
    }

    /// Confirm an account with the emailed code. Success returns to `Idle`.
    ///
    /// # Errors
    /// As [`register`](Self::register)
    pub async fn verify(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let held = self.begin(true)?;
        match self.remote("verify", self.api.verify(email, code)).await {
            Ok(()) => {
                tracing::info!(email, "account verified");
                self.transition(AuthState::Idle);
                Ok(())
            }
            Err(e) => Err(self.fail(e, held)),
        }
    }

    /// Sign in.
    ///
    /// In order: tokens saved, profile saved, identity switched to the account,
    /// `Authenticated`, then claimed guest records migrated. A failed migration
    /// is logged and parked; it never fails the login.
    ///
    /// # Errors
    /// - `AuthError::InFlight` if another request is loading
    /// - the server rejection, timeout or transport failure
    /// - `AuthError::Storage` if the session could not be saved
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let held = self.begin(false)?;
        let guest = self.resolver.resolve().await;

        let data = match self
            .remote("login", self.api.login(email, password, &guest))
            .await
        {
            Ok(data) if data.user_id.trim().is_empty() => {
                let err = AuthError::Transport("login response has no user id".into());
                return Err(self.fail(err, held));
            }
            Ok(data) => data,
            Err(e) => return Err(self.fail(e, held)),
        };

        let user = Profile::new(
            Identity::account(&data.user_id),
            data.email.clone().unwrap_or_else(|| email.to_string()),
            data.tier(),
        );

        if let Err(e) = self.persist(&data.tokens(), &user).await {
            if let Err(cleanup) = self.sessions.clear().await {
                tracing::warn!(error = %cleanup, "failed to clear partial session");
            }
            return Err(self.fail(AuthError::Storage(e), held));
        }

        self.resolver.set_account(user.id.clone());
        tracing::info!(user = %user.id, tier = %user.tier, "logged in");
        self.transition(AuthState::Authenticated { user: user.clone() });

        if let Some(count) = data.data_claimed.filter(|n| *n > 0) {
            let old = data.claimed_from().unwrap_or(guest);
            if let Err(e) = self.migrator.migrate(&old, &user.id, count).await {
                tracing::warn!(error = %e, "guest record migration deferred");
            }
        }
        Ok(())
    }

    /// Sign out. The remote call is best-effort; local state is always cleared.
    pub async fn logout(&self) {
        if let Some(tokens) = self.sessions.load_tokens().await {
            if let Err(e) = self
                .remote("logout", self.api.logout(&tokens.access_token))
                .await
            {
                tracing::warn!(error = %e, "remote logout failed, clearing local session anyway");
            }
        }
        if let Err(e) = self.sessions.clear().await {
            tracing::warn!(error = %e, "failed to clear stored session");
        }
        // Queued token writes must not resurrect the session
        if let Some(writer) = &self.writer {
            if let Err(e) = writer.submit(SaveRequest::Clear).await {
                tracing::debug!(error = %e, "background writer already stopped");
            }
        }
        self.resolver.clear_account();
        tracing::info!("logged out");
        self.transition(AuthState::Idle);
    }

    /// Exchange the refresh token for new tokens.
    ///
    /// Returns `true` with the new tokens persisted and state unchanged. Any
    /// failure (no stored session, server refusal, timeout, unsavable tokens)
    /// ends the session with a full [`logout`](Self::logout) and returns `false`.
    pub async fn refresh_token(&self) -> bool {
        let Some(previous) = self.sessions.load_tokens().await else {
            tracing::warn!("refresh requested without a stored session");
            self.logout().await;
            return false;
        };

        let fresh = match self
            .remote("refresh", self.api.refresh(&previous.refresh_token))
            .await
        {
            Ok(data) => data.merge_into(&previous),
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, ending session");
                self.logout().await;
                return false;
            }
        };

        if let Err(e) = self.store_tokens(fresh).await {
            tracing::error!(error = %e, "refreshed tokens could not be saved, ending session");
            self.logout().await;
            return false;
        }
        tracing::debug!("tokens refreshed");
        true
    }

    /// Leave `Error`: back to `Authenticated` if a profile is held, else `Idle`.
    /// No-op in any other state.
    pub fn clear_error(&self) {
        let next = match &*self.state.borrow() {
            AuthState::Error { user: Some(user), .. } => AuthState::Authenticated { user: user.clone() },
            AuthState::Error { user: None, .. } => AuthState::Idle,
            _ => return,
        };
        self.transition(next);
    }

    /// Drain the background writer, if any
    pub async fn shutdown(self) {
        if let Some(writer) = self.writer {
            writer.shutdown().await;
        }
    }

    /// Enter `Loading`, returning the profile held before.
    ///
    /// `signed_out_only` refuses the flow while a profile is held.
    fn begin(&self, signed_out_only: bool) -> Result<Option<Profile>, AuthError> {
        let mut held = None;
        let mut refused = None;
        self.state.send_if_modified(|state| {
            if matches!(state, AuthState::Loading { .. }) {
                refused = Some(AuthError::InFlight);
                return false;
            }
            if signed_out_only && state.user().is_some() {
                refused = Some(AuthError::SignedIn);
                return false;
            }
            held = state.user().cloned();
            *state = AuthState::Loading { user: held.clone() };
            true
        });

        if let Some(err) = refused {
            tracing::warn!(error = %err, "auth request refused");
            return Err(err);
        }
        tracing::debug!("auth request started");
        self.announce(AuthStatus::Loading);
        Ok(held)
    }

    fn fail(&self, err: AuthError, held: Option<Profile>) -> AuthError {
        tracing::warn!(error = %err, "auth request failed");
        self.transition(AuthState::Error {
            error: err.to_string(),
            user: held,
        });
        err
    }

    /// Apply a legal transition; illegal ones are logged and dropped
    fn transition(&self, next: AuthState) {
        let to = next.status();
        let mut from = None;
        self.state.send_if_modified(|state| {
            let current = state.status();
            if let Err(e) = validate_transition(current, to) {
                tracing::error!(error = %e, "refusing auth transition");
                return false;
            }
            from = Some(current);
            let changed = *state != next;
            *state = next;
            changed
        });

        if let Some(from) = from {
            if from != to {
                tracing::info!(from = from.as_str(), to = to.as_str(), "auth state changed");
                self.announce(to);
            }
        }
    }

    fn announce(&self, status: AuthStatus) {
        self.bus.publish(Notification::AuthChanged { status });
    }

    async fn remote<T, F>(&self, op: &'static str, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => {
                tracing::warn!(op, timeout_secs = self.timeout.as_secs(), "auth request timed out");
                Err(AuthError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }

    async fn persist(&self, tokens: &Tokens, user: &Profile) -> Result<(), StoreError> {
        self.sessions.save_tokens(tokens).await?;
        self.sessions.save_profile(user).await
    }

    /// Save refreshed tokens and wait for the outcome. Through the background
    /// writer when one is attached, so they land behind any queued write.
    async fn store_tokens(&self, tokens: Tokens) -> Result<(), StoreError> {
        if let Some(writer) = &self.writer {
            match writer.write(SaveRequest::Tokens(tokens.clone())).await {
                Ok(()) => return Ok(()),
                Err(WriterError::Failed(e)) => return Err(e),
                Err(WriterError::Closed) => {
                    tracing::warn!("background writer unavailable, saving inline");
                }
            }
        }
        self.sessions.save_tokens(&tokens).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{login_data, StubApi};
    use pretty_assertions::assert_eq;
    use yoru_core::{MemoryStore, Tier};
    use yoru_identity::HostIdentity;
    use yoru_ledger::LocalLedger;

    struct FixedHost;

    #[async_trait::async_trait]
    impl HostIdentity for FixedHost {
        async fn machine_fingerprint(&self) -> Result<String, yoru_identity::HostError> {
            Ok("abc123".into())
        }
    }

    fn service(api: StubApi, timeout_secs: u64) -> (AuthService, SessionStore) {
        let kv = Arc::new(MemoryStore::new());
        let sessions = SessionStore::new(kv.clone());
        let bus = NotificationBus::default();
        let ledger = Arc::new(LocalLedger::new(kv.clone()));
        let migrator = Arc::new(Migrator::new(ledger, kv, bus.clone(), 1));
        let resolver = Arc::new(IdentityResolver::new(Arc::new(FixedHost)));
        let config = AuthConfig::default().with_timeout_secs(timeout_secs);
        let service = AuthService::new(Arc::new(api), resolver, sessions.clone(), migrator, bus, &config);
        (service, sessions)
    }

    #[tokio::test]
    async fn login_builds_profile_with_fallbacks() {
        let (auth, sessions) = service(StubApi::accepting(login_data("42")), 5);
        auth.login("a@x.com", "pw").await.unwrap();

        let expected = Profile::new(Identity::account("42"), "a@x.com", Tier::Free);
        assert_eq!(auth.state(), AuthState::Authenticated { user: expected.clone() });
        assert_eq!(sessions.load_profile().await, Some(expected));
        assert_eq!(auth.resolver().current().await, Identity::account("42"));
    }

    #[tokio::test]
    async fn rejected_login_keeps_guest_identity() {
        let (auth, _) = service(StubApi::rejecting("Invalid credentials"), 5);
        let err = auth.login("a@x.com", "bad").await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid credentials");
        assert_eq!(auth.state().error(), Some("Invalid credentials"));
        assert_eq!(auth.resolver().current().await, Identity::device("abc123"));
    }

    #[tokio::test]
    async fn second_request_while_loading_is_refused() {
        let (auth, _) = service(StubApi::accepting(login_data("42")).delayed(Duration::from_millis(200)), 5);
        let auth = Arc::new(auth);

        let first = {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.login("a@x.com", "pw").await })
        };
        let mut rx = auth.subscribe();
        rx.wait_for(|s| s.status() == AuthStatus::Loading).await.unwrap();

        assert!(matches!(auth.register("b@x.com", "pw").await, Err(AuthError::InFlight)));
        first.await.unwrap().unwrap();
        assert!(auth.state().is_authenticated());
    }

    #[tokio::test]
    async fn register_and_verify_refused_while_signed_in() {
        let (auth, sessions) = service(StubApi::accepting(login_data("42")), 5);
        auth.login("a@x.com", "pw").await.unwrap();
        let before = auth.state();

        assert!(matches!(auth.register("b@x.com", "pw").await, Err(AuthError::SignedIn)));
        assert!(matches!(auth.verify("b@x.com", "123456").await, Err(AuthError::SignedIn)));

        assert_eq!(auth.state(), before);
        assert!(sessions.load().await.is_some());
        assert_eq!(auth.resolver().current().await, Identity::account("42"));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_request_times_out_into_error() {
        let (auth, _) = service(StubApi::accepting(login_data("42")).delayed(Duration::from_secs(60)), 2);
        let err = auth.login("a@x.com", "pw").await.unwrap_err();

        assert!(matches!(err, AuthError::Timeout { secs: 2 }));
        assert_eq!(auth.state().status(), AuthStatus::Error);
    }

    #[tokio::test]
    async fn clear_error_outside_error_is_noop() {
        let (auth, _) = service(StubApi::accepting(login_data("42")), 5);
        auth.clear_error();
        assert_eq!(auth.state(), AuthState::Idle);
    }
}
