//! Command-line interface handling for the session hub.
//!
//! This module provides command-line argument parsing using the `clap`
//! builder API. Every option overrides the matching configuration file
//! setting.

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

/// Configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "hub.toml";

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for bind address
    pub bind_address: Option<String>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the worker credential
    pub worker_secret: Option<String>,
    /// Optional queue database; selects the SQLite-backed queue
    pub queue_path: Option<PathBuf>,
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            bind_address: matches.get_one::<String>("bind").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            worker_secret: matches.get_one::<String>("worker-secret").cloned(),
            queue_path: matches.get_one::<String>("queue-path").map(PathBuf::from),
        }
    }
}

fn command() -> Command {
    Command::new("Session Hub")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Routes players, matchmaking and game workers for Power Spree")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDRESS")
                .help("Bind address (e.g., 0.0.0.0:5555)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("worker-secret")
                .long("worker-secret")
                .value_name("SECRET")
                .help("Token that identifies simulation workers"),
        )
        .arg(
            Arg::new("queue-path")
                .long("queue-path")
                .value_name("FILE")
                .help("Use the SQLite matchmaking queue database at this path"),
        )
}
