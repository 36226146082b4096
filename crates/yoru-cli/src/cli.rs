//! Command-line definition

use clap::{value_parser, Arg, ArgAction, Command};
use std::net::SocketAddr;
use std::path::PathBuf;

fn email() -> Arg {
    Arg::new("email")
        .long("email")
        .required(true)
        .help("Account email address")
}

fn password() -> Arg {
    Arg::new("password")
        .long("password")
        .required(true)
        .help("Account password")
}

/// `yoru` command tree
#[must_use]
pub fn command() -> Command {
    Command::new("yoru")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Yorutsuke identity, session and ledger tool")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit diagnostics as JSON"),
        )
        .subcommand(Command::new("whoami").about("Show the current identity and auth state"))
        .subcommand(
            Command::new("register")
                .about("Create an account")
                .arg(email())
                .arg(password()),
        )
        .subcommand(
            Command::new("verify")
                .about("Confirm an account with the emailed code")
                .arg(email())
                .arg(
                    Arg::new("code")
                        .long("code")
                        .required(true)
                        .help("Verification code"),
                ),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in and claim this device's records")
                .arg(email())
                .arg(password()),
        )
        .subcommand(Command::new("logout").about("Sign out and forget the stored session"))
        .subcommand(Command::new("refresh").about("Refresh the stored tokens"))
        .subcommand(
            Command::new("transactions").about("List local transactions of the current identity"),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve the transaction API over HTTP")
                .arg(
                    Arg::new("addr")
                        .long("addr")
                        .default_value("127.0.0.1:8788")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address"),
                ),
        )
        .subcommand(
            Command::new("logs")
                .about("Daily log files")
                .subcommand_required(true)
                .subcommand(Command::new("path").about("Print today's log file path"))
                .subcommand(
                    Command::new("cleanup")
                        .about("Delete old log files")
                        .arg(
                            Arg::new("retention-days")
                                .long("retention-days")
                                .value_parser(value_parser!(u64))
                                .help("Days to keep (default from config)"),
                        ),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn parses_login() {
        let matches = command()
            .try_get_matches_from(["yoru", "login", "--email", "a@x.com", "--password", "pw"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "login");
        assert_eq!(args.get_one::<String>("email").unwrap(), "a@x.com");
    }

    #[test]
    fn global_flags_after_subcommand() {
        let matches = command()
            .try_get_matches_from(["yoru", "whoami", "--log-json", "--config", "/tmp/y.toml"])
            .unwrap();
        assert!(matches.get_flag("log-json"));
        assert_eq!(
            matches.get_one::<PathBuf>("config").unwrap(),
            &PathBuf::from("/tmp/y.toml")
        );
    }

    #[test]
    fn cleanup_retention_is_numeric() {
        assert!(command()
            .try_get_matches_from(["yoru", "logs", "cleanup", "--retention-days", "soon"])
            .is_err());
    }
}
