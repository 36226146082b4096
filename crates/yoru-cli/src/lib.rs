//! Yorutsuke CLI
//!
//! Wires the identity, session, auth and ledger crates into one process
//! context and exposes them as `yoru` subcommands.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cli;
pub mod commands;
pub mod context;
pub mod telemetry;

pub use context::AppContext;
