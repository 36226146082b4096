//! CLI handlers against file-backed storage

use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use yoru_auth::PENDING_KEY;
use yoru_cli::{commands, AppContext};
use yoru_core::storage::save_json;
use yoru_core::{AppConfig, AuthStatus, FileStore, Identity, KeyValueStore, OwnershipClaim};
use yoru_identity::HostIdentity;
use yoru_ledger::{LocalLedger, LocalTransaction};
use yoru_test_utils::{claiming_login, day, rejected, DeniedHost, FakeAuthApi, FixedHost};

fn config(root: &Path) -> AppConfig {
    AppConfig::default()
        .with_data_dir(root.join("data"))
        .with_logs_dir(root.join("logs"))
}

async fn open(root: &Path, api: FakeAuthApi, host: Arc<dyn HostIdentity>) -> AppContext {
    let ctx = AppContext::open_with(config(root), Arc::new(api), host)
        .await
        .unwrap();
    ctx.auth.init().await;
    ctx
}

fn fixed() -> Arc<dyn HostIdentity> {
    Arc::new(FixedHost("abc123".into()))
}

#[tokio::test]
async fn whoami_as_guest() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = open(dir.path(), FakeAuthApi::new(), fixed()).await;

    let out = commands::whoami(&ctx).await.unwrap();
    assert!(out.contains("identity: device-abc123"));
    assert!(out.contains("status:   idle"));
}

#[tokio::test]
async fn ephemeral_identity_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let first = open(dir.path(), FakeAuthApi::new(), Arc::new(DeniedHost)).await;
    let id = first.auth.resolver().resolve().await;
    assert!(id.is_ephemeral());
    assert!(commands::whoami(&first).await.unwrap().contains("temporary guest id"));
    first.close().await;

    let second = open(dir.path(), FakeAuthApi::new(), Arc::new(DeniedHost)).await;
    assert_eq!(second.auth.resolver().resolve().await, id);
}

#[tokio::test]
async fn login_claims_records_and_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let guest = Identity::device("abc123");
    let api = FakeAuthApi::new().on_login(Ok(claiming_login("42", 3, &guest)));
    let ctx = open(dir.path(), api, fixed()).await;
    for d in 1..=3 {
        ctx.ledger
            .insert(LocalTransaction::new(guest.clone(), day(d), -700, "Seicomart"))
            .await
            .unwrap();
    }

    let out = commands::login(&ctx, "a@x.com", "pw").await.unwrap();
    assert!(out.contains("logged in as a@x.com (user-42)"));
    assert!(out.contains("claimed 3 guest record(s) from device-abc123"));

    let listed = commands::transactions(&ctx).await.unwrap();
    assert!(listed.contains("3 transaction(s) for user-42"));
    ctx.close().await;

    let restarted = open(dir.path(), FakeAuthApi::new(), fixed()).await;
    assert_eq!(restarted.auth.state().status(), AuthStatus::Authenticated);
    assert_eq!(
        restarted.auth.resolver().current().await,
        Identity::account("42")
    );
    assert!(commands::whoami(&restarted)
        .await
        .unwrap()
        .contains("email:    a@x.com"));
}

#[tokio::test]
async fn claim_parked_by_earlier_run_settles_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let guest = Identity::device("abc123");
    let account = Identity::account("42");

    let store: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::open(dir.path().join("data")).await.unwrap());
    let ledger = LocalLedger::new(Arc::clone(&store));
    for d in 1..=2 {
        ledger
            .insert(LocalTransaction::new(guest.clone(), day(d), -400, "Lawson"))
            .await
            .unwrap();
    }
    let parked = [OwnershipClaim {
        count: 2,
        old_identity: guest.clone(),
        new_identity: account.clone(),
    }];
    save_json(store.as_ref(), PENDING_KEY, &parked).await.unwrap();

    let ctx = open(dir.path(), FakeAuthApi::new(), fixed()).await;
    assert_eq!(ctx.ledger.count_by_owner(&account).await.unwrap(), 2);
    assert_eq!(ctx.ledger.count_by_owner(&guest).await.unwrap(), 0);
    assert!(ctx.auth.migrator().pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_login_reports_server_message() {
    let dir = tempfile::tempdir().unwrap();
    let api = FakeAuthApi::new().on_login(Err(rejected("Invalid credentials")));
    let ctx = open(dir.path(), api, fixed()).await;

    let err = commands::login(&ctx, "a@x.com", "nope").await.unwrap_err();
    assert_eq!(err.root_cause().to_string(), "Invalid credentials");
    assert_eq!(ctx.auth.state().status(), AuthStatus::Error);
}

#[tokio::test]
async fn refresh_without_session_fails() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = open(dir.path(), FakeAuthApi::new(), fixed()).await;

    assert!(commands::refresh(&ctx).await.is_err());
    assert!(ctx.sessions.load().await.is_none());
}

#[tokio::test]
async fn commands_are_recorded_in_daily_log() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = open(dir.path(), FakeAuthApi::new(), fixed()).await;

    commands::logout(&ctx).await.unwrap();

    let path = commands::logs_path(&ctx);
    let text = tokio::fs::read_to_string(path.trim()).await.unwrap();
    let entry: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(entry["event"], "auth.logout");
    assert_eq!(entry["userId"], "device-abc123");
}

#[tokio::test]
async fn logs_cleanup_removes_only_old_dated_files() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = open(dir.path(), FakeAuthApi::new(), fixed()).await;
    let logs = dir.path().join("logs");
    tokio::fs::create_dir_all(&logs).await.unwrap();
    tokio::fs::write(logs.join("2001-01-01.jsonl"), "{}\n").await.unwrap();
    tokio::fs::write(logs.join("notes.jsonl"), "{}\n").await.unwrap();
    ctx.record("info", "app.start", serde_json::json!({})).await;

    let out = commands::logs_cleanup(&ctx, Some(7)).await.unwrap();
    assert!(out.starts_with("deleted 1 log file(s)"));
    assert!(!logs.join("2001-01-01.jsonl").exists());
    assert!(logs.join("notes.jsonl").exists());
    assert!(ctx.logs.current_path().exists());
}
