//! Command handlers
//!
//! Each handler returns the text to print so it can be driven from tests.

use crate::context::AppContext;
use anyhow::{bail, Context as _};
use clap::ArgMatches;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use yoru_core::AuthState;
use yoru_ledger::TransactionStore;

/// Dispatch a parsed subcommand
pub async fn dispatch(ctx: &AppContext, matches: &ArgMatches) -> anyhow::Result<String> {
    match matches.subcommand() {
        Some(("whoami", _)) => whoami(ctx).await,
        Some(("register", args)) => register(ctx, arg(args, "email")?, arg(args, "password")?).await,
        Some(("verify", args)) => verify(ctx, arg(args, "email")?, arg(args, "code")?).await,
        Some(("login", args)) => login(ctx, arg(args, "email")?, arg(args, "password")?).await,
        Some(("logout", _)) => logout(ctx).await,
        Some(("refresh", _)) => refresh(ctx).await,
        Some(("transactions", _)) => transactions(ctx).await,
        Some(("serve", args)) => {
            let addr = *args
                .get_one::<SocketAddr>("addr")
                .context("missing --addr")?;
            serve(addr).await.map(|()| String::new())
        }
        Some(("logs", args)) => match args.subcommand() {
            Some(("path", _)) => Ok(logs_path(ctx)),
            Some(("cleanup", sub)) => logs_cleanup(ctx, sub.get_one::<u64>("retention-days").copied()).await,
            _ => bail!("unknown logs subcommand"),
        },
        _ => bail!("unknown command"),
    }
}

fn arg<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing --{name}"))
}

pub async fn whoami(ctx: &AppContext) -> anyhow::Result<String> {
    let identity = ctx.auth.resolver().current().await;
    let state = ctx.auth.state();
    let mut out = format!("identity: {identity}\nstatus:   {}\n", state.status().as_str());
    if let Some(user) = state.user() {
        out.push_str(&format!("email:    {}\ntier:     {}\n", user.email, user.tier));
    }
    if identity.is_ephemeral() {
        out.push_str("note:     device identity unavailable, using a temporary guest id\n");
    }
    Ok(out)
}

pub async fn register(ctx: &AppContext, email: &str, password: &str) -> anyhow::Result<String> {
    let result = ctx.auth.register(email, password).await;
    ctx.record(level(&result), "auth.register", json!({ "email": email })).await;
    result.context("registration failed")?;
    Ok(format!("registered {email}; check your inbox for the verification code\n"))
}

pub async fn verify(ctx: &AppContext, email: &str, code: &str) -> anyhow::Result<String> {
    let result = ctx.auth.verify(email, code).await;
    ctx.record(level(&result), "auth.verify", json!({ "email": email })).await;
    result.context("verification failed")?;
    Ok(format!("verified {email}; you can log in now\n"))
}

pub async fn login(ctx: &AppContext, email: &str, password: &str) -> anyhow::Result<String> {
    let mut claims = ctx.bus.subscribe();
    let result = ctx.auth.login(email, password).await;
    ctx.record(level(&result), "auth.login", json!({ "email": email })).await;
    result.context("login failed")?;

    let mut out = match ctx.auth.state() {
        AuthState::Authenticated { user } => format!("logged in as {} ({})\n", user.email, user.id),
        other => format!("login finished in state {}\n", other.status().as_str()),
    };
    while let Ok(notification) = claims.try_recv() {
        if let yoru_core::Notification::OwnershipClaimed(claim) = notification {
            out.push_str(&format!(
                "claimed {} guest record(s) from {}\n",
                claim.count, claim.old_identity
            ));
        }
    }
    Ok(out)
}

pub async fn logout(ctx: &AppContext) -> anyhow::Result<String> {
    ctx.auth.logout().await;
    ctx.record("info", "auth.logout", json!({})).await;
    Ok("logged out\n".to_string())
}

pub async fn refresh(ctx: &AppContext) -> anyhow::Result<String> {
    if ctx.auth.refresh_token().await {
        ctx.record("info", "auth.refresh", json!({})).await;
        Ok("tokens refreshed\n".to_string())
    } else {
        ctx.record("warn", "auth.refresh", json!({ "sessionEnded": true })).await;
        bail!("token refresh failed; the session has been ended")
    }
}

pub async fn transactions(ctx: &AppContext) -> anyhow::Result<String> {
    let identity = ctx.auth.resolver().current().await;
    let records = ctx
        .auth
        .migrator()
        .list_for(&identity)
        .await
        .context("reading local transactions")?;

    if records.is_empty() {
        return Ok(format!("no transactions for {identity}\n"));
    }
    let mut out: String = records
        .iter()
        .map(|record| {
            format!(
                "{}  {:>10}  {:<24}  {}\n",
                record.date, record.amount, record.merchant, record.category
            )
        })
        .collect();
    out.push_str(&format!("{} transaction(s) for {identity}\n", records.len()));
    Ok(out)
}

/// Serve the transaction API until Ctrl-C
pub async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let store = Arc::new(TransactionStore::new());
    let (bound, server) = warp::serve(yoru_ledger::api::routes(store))
        .try_bind_with_graceful_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%bound, "transaction API listening");
    server.await;
    tracing::info!("transaction API stopped");
    Ok(())
}

pub fn logs_path(ctx: &AppContext) -> String {
    format!("{}\n", ctx.logs.current_path().display())
}

pub async fn logs_cleanup(ctx: &AppContext, retention_days: Option<u64>) -> anyhow::Result<String> {
    let retention = match retention_days {
        Some(days) => days,
        None => u64::try_from(ctx.config.logging.retention_days)
            .context("logging.retention_days must not be negative")?,
    };
    let deleted = ctx
        .logs
        .cleanup(retention)
        .await
        .context("cleaning up log files")?;
    Ok(format!("deleted {deleted} log file(s) older than {retention} day(s)\n"))
}

fn level<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "info"
    } else {
        "error"
    }
}
