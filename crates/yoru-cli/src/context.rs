//! Process context
//!
//! One [`AppContext`] per process owns every long-lived component. Nothing is
//! global; commands borrow what they need from here.

use anyhow::Context as _;
use std::sync::Arc;
use yoru_auth::{AuthApi, AuthService, HttpAuthApi, Migrator};
use yoru_core::{AppConfig, DailyLogSink, FileStore, KeyValueStore, LogEntry, NotificationBus};
use yoru_identity::{HostIdentity, IdentityResolver, MachineIdHost};
use yoru_ledger::LocalLedger;
use yoru_session::{RetryPolicy, SessionStore, SessionWriter};

/// Wired application
pub struct AppContext {
    pub config: AppConfig,
    pub bus: NotificationBus,
    pub sessions: SessionStore,
    pub ledger: Arc<LocalLedger>,
    pub auth: AuthService,
    pub logs: DailyLogSink,
}

impl AppContext {
    /// Production wiring: file storage, OS machine id, HTTP auth API
    pub async fn open(config: AppConfig) -> anyhow::Result<Self> {
        let host: Arc<dyn HostIdentity> = Arc::new(match &config.storage.machine_id_path {
            Some(path) => MachineIdHost::with_path(path),
            None => MachineIdHost::new(),
        });
        let api: Arc<dyn AuthApi> =
            Arc::new(HttpAuthApi::new(&config.auth).context("building auth client")?);
        Self::open_with(config, api, host).await
    }

    /// Wiring with the remote seams supplied by the caller
    pub async fn open_with(
        config: AppConfig,
        api: Arc<dyn AuthApi>,
        host: Arc<dyn HostIdentity>,
    ) -> anyhow::Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(
            FileStore::open(&config.storage.data_dir)
                .await
                .with_context(|| format!("opening data dir {}", config.storage.data_dir.display()))?,
        );

        let bus = NotificationBus::default();
        let resolver = Arc::new(IdentityResolver::new(host).with_store(Arc::clone(&store)));
        let sessions = SessionStore::new(Arc::clone(&store));
        let ledger = Arc::new(LocalLedger::new(Arc::clone(&store)));
        let migrator = Arc::new(Migrator::new(
            Arc::clone(&ledger),
            store,
            bus.clone(),
            config.auth.migration_retries,
        ));
        // A claim parked by an earlier run must land before anything reads records
        match migrator.settle().await {
            Ok(0) => {}
            Ok(applied) => tracing::info!(applied, "settled parked ownership claims"),
            Err(e) => tracing::warn!(error = %e, "parked ownership claims still unsettled"),
        }
        let writer = SessionWriter::spawn(sessions.clone(), RetryPolicy::default(), bus.clone());
        let auth = AuthService::new(api, resolver, sessions.clone(), migrator, bus.clone(), &config.auth)
            .with_background_writer(writer);
        let logs = DailyLogSink::new(&config.logging.dir);

        tracing::debug!(data_dir = %config.storage.data_dir.display(), "context opened");
        Ok(Self {
            config,
            bus,
            sessions,
            ledger,
            auth,
            logs,
        })
    }

    /// Append an entry to today's log file. Failures are logged, not raised.
    pub async fn record(&self, level: &str, event: &str, fields: serde_json::Value) {
        let identity = self.auth.resolver().current().await;
        let mut entry = LogEntry::now(level, event, uuid::Uuid::new_v4().simple().to_string())
            .with_user(identity.to_string());
        if let serde_json::Value::Object(map) = fields {
            entry.extra.extend(map);
        }
        if let Err(e) = self.logs.write(&entry).await {
            tracing::warn!(event, error = %e, "failed to write log entry");
        }
    }

    /// Flush background work
    pub async fn close(self) {
        self.auth.shutdown().await;
    }
}
