//! Testing utilities for the Yorutsuke workspace
//!
//! Scriptable fakes for the remote auth API and the host identity call, a
//! store that can be told to fail, fixtures, and [`TestApp`], which wires the
//! whole auth stack the way the CLI does but in memory.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use yoru_auth::{ApiError, AuthApi, AuthService, LoginData, Migrator, RefreshData};
use yoru_core::{
    AuthConfig, Identity, KeyValueStore, NotificationBus, Profile, Session, Tier, Tokens,
};
use yoru_identity::{HostError, HostIdentity, IdentityResolver};
use yoru_ledger::{LocalLedger, LocalTransaction};
use yoru_session::{RetryPolicy, SessionStore, SessionWriter};

pub use yoru_core::testing::FlakyStore;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn tokens() -> Tokens {
    Tokens {
        access_token: "access-1".into(),
        refresh_token: "refresh-1".into(),
        id_token: "id-1".into(),
    }
}

pub fn profile(subject: &str) -> Profile {
    Profile::new(Identity::account(subject), format!("{subject}@example.com"), Tier::Basic)
}

pub fn session(subject: &str) -> Session {
    Session {
        tokens: tokens(),
        profile: profile(subject),
    }
}

/// Login payload with no email, tier or claim
pub fn login_data(user_id: &str) -> LoginData {
    LoginData {
        access_token: "access-1".into(),
        refresh_token: "refresh-1".into(),
        id_token: "id-1".into(),
        user_id: user_id.into(),
        email: None,
        tier: None,
        data_claimed: None,
        device_id: None,
    }
}

/// Login payload reporting `count` records claimed from `device`
pub fn claiming_login(user_id: &str, count: u64, device: &Identity) -> LoginData {
    LoginData {
        data_claimed: Some(count),
        device_id: Some(device.to_string()),
        ..login_data(user_id)
    }
}

pub fn refresh_data(access_token: &str, refresh_token: Option<&str>) -> RefreshData {
    RefreshData {
        access_token: access_token.into(),
        refresh_token: refresh_token.map(str::to_string),
        id_token: "id-2".into(),
    }
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

// ---------------------------------------------------------------------------
// Host identity
// ---------------------------------------------------------------------------

/// Host that always reports the same fingerprint
#[derive(Debug, Clone)]
pub struct FixedHost(pub String);

#[async_trait]
impl HostIdentity for FixedHost {
    async fn machine_fingerprint(&self) -> Result<String, HostError> {
        Ok(self.0.clone())
    }
}

/// Host whose identity call is always denied
#[derive(Debug, Clone, Copy, Default)]
pub struct DeniedHost;

#[async_trait]
impl HostIdentity for DeniedHost {
    async fn machine_fingerprint(&self) -> Result<String, HostError> {
        Err(HostError::Unavailable("denied by sandbox".into()))
    }
}

// ---------------------------------------------------------------------------
// Remote auth API
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Script {
    register: VecDeque<Result<(), ApiError>>,
    verify: VecDeque<Result<(), ApiError>>,
    login: VecDeque<Result<LoginData, ApiError>>,
    logout: VecDeque<Result<(), ApiError>>,
    refresh: VecDeque<Result<RefreshData, ApiError>>,
}

/// Calls the fake has seen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLog {
    pub register: usize,
    pub verify: usize,
    pub login: usize,
    pub logout: usize,
    pub refresh: usize,
    /// `device_id` of each login, in order
    pub login_devices: Vec<Identity>,
    /// Refresh tokens presented, in order
    pub refresh_tokens: Vec<String>,
}

/// Scriptable remote auth API.
///
/// Each endpoint answers from its own queue; an empty queue answers
/// `Ok` for register / verify / logout and a rejection for login / refresh.
#[derive(Debug, Default)]
pub struct FakeAuthApi {
    script: Mutex<Script>,
    calls: Mutex<CallLog>,
    delay: Option<Duration>,
}

impl FakeAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_register(self, result: Result<(), ApiError>) -> Self {
        self.script.lock().register.push_back(result);
        self
    }

    pub fn on_verify(self, result: Result<(), ApiError>) -> Self {
        self.script.lock().verify.push_back(result);
        self
    }

    pub fn on_login(self, result: Result<LoginData, ApiError>) -> Self {
        self.script.lock().login.push_back(result);
        self
    }

    pub fn on_logout(self, result: Result<(), ApiError>) -> Self {
        self.script.lock().logout.push_back(result);
        self
    }

    pub fn on_refresh(self, result: Result<RefreshData, ApiError>) -> Self {
        self.script.lock().refresh.push_back(result);
        self
    }

    /// Hold every answer for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.lock().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn rejected(message: &str) -> ApiError {
    ApiError::Rejected(message.into())
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn register(&self, _email: &str, _password: &str) -> Result<(), ApiError> {
        self.calls.lock().register += 1;
        self.pause().await;
        self.script.lock().register.pop_front().unwrap_or(Ok(()))
    }

    async fn verify(&self, _email: &str, _code: &str) -> Result<(), ApiError> {
        self.calls.lock().verify += 1;
        self.pause().await;
        self.script.lock().verify.pop_front().unwrap_or(Ok(()))
    }

    async fn login(&self, _email: &str, _password: &str, device_id: &Identity) -> Result<LoginData, ApiError> {
        {
            let mut calls = self.calls.lock();
            calls.login += 1;
            calls.login_devices.push(device_id.clone());
        }
        self.pause().await;
        self.script
            .lock()
            .login
            .pop_front()
            .unwrap_or_else(|| Err(rejected("no login scripted")))
    }

    async fn logout(&self, _access_token: &str) -> Result<(), ApiError> {
        self.calls.lock().logout += 1;
        self.pause().await;
        self.script.lock().logout.pop_front().unwrap_or(Ok(()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshData, ApiError> {
        {
            let mut calls = self.calls.lock();
            calls.refresh += 1;
            calls.refresh_tokens.push(refresh_token.to_string());
        }
        self.pause().await;
        self.script
            .lock()
            .refresh
            .pop_front()
            .unwrap_or_else(|| Err(rejected("no refresh scripted")))
    }
}

// ---------------------------------------------------------------------------
// Wired stack
// ---------------------------------------------------------------------------

/// Fingerprint [`TestApp`]'s host reports
pub const FINGERPRINT: &str = "abc123";

/// In-memory auth stack
pub struct TestApp {
    pub store: Arc<FlakyStore>,
    pub bus: NotificationBus,
    pub sessions: SessionStore,
    pub ledger: Arc<LocalLedger>,
    pub migrator: Arc<Migrator>,
    pub api: Arc<FakeAuthApi>,
    pub auth: AuthService,
}

impl TestApp {
    pub fn new(api: FakeAuthApi) -> Self {
        Self::with_config(api, &AuthConfig::default())
    }

    pub fn with_config(api: FakeAuthApi, config: &AuthConfig) -> Self {
        Self::over(Arc::new(FlakyStore::new()), api, config)
    }

    /// Fresh stack over this app's storage, as after a process restart
    pub fn restart(&self, api: FakeAuthApi) -> Self {
        Self::over(Arc::clone(&self.store), api, &AuthConfig::default())
    }

    fn over(store: Arc<FlakyStore>, api: FakeAuthApi, config: &AuthConfig) -> Self {
        let kv: Arc<dyn KeyValueStore> = store.clone();
        let bus = NotificationBus::default();
        let sessions = SessionStore::new(Arc::clone(&kv));
        let ledger = Arc::new(LocalLedger::new(Arc::clone(&kv)));
        let migrator = Arc::new(Migrator::new(
            Arc::clone(&ledger),
            Arc::clone(&kv),
            bus.clone(),
            config.migration_retries,
        ));
        let resolver = Arc::new(
            IdentityResolver::new(Arc::new(FixedHost(FINGERPRINT.into()))).with_store(kv),
        );
        let api = Arc::new(api);
        let auth = AuthService::new(
            api.clone(),
            resolver,
            sessions.clone(),
            Arc::clone(&migrator),
            bus.clone(),
            config,
        );
        Self {
            store,
            bus,
            sessions,
            ledger,
            migrator,
            api,
            auth,
        }
    }

    /// Route refreshed-token saves and the logout clear through a background writer
    pub fn with_background_writer(self) -> Self {
        let writer = SessionWriter::spawn(
            self.sessions.clone(),
            RetryPolicy::default(),
            self.bus.clone(),
        );
        Self {
            auth: self.auth.with_background_writer(writer),
            ..self
        }
    }

    /// Guest identity of this app
    pub fn guest(&self) -> Identity {
        Identity::device(FINGERPRINT)
    }

    /// Insert `n` local records owned by `owner`, one per day from the 1st
    pub async fn seed_records(&self, owner: &Identity, n: u32) {
        for d in 1..=n {
            self.ledger
                .insert(LocalTransaction::new(owner.clone(), day(d), -500, "Lawson"))
                .await
                .unwrap();
        }
    }
}
