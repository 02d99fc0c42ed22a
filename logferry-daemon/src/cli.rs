//! CLI argument definitions for logferry-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// logferry log shipping daemon.
///
/// Consumes object-created notifications from a queue, fetches the
/// referenced gzip log objects, parses every line and forwards each
/// entry to an HTTP indexing endpoint.
#[derive(Parser, Debug)]
#[command(name = "logferry-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logferry.toml configuration file.
    #[arg(short, long, default_value = "/etc/logferry/logferry.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
