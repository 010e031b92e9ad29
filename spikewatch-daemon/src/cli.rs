//! CLI argument definitions for spikewatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Spikewatch error-spike alerting daemon.
///
/// Watches a directory of delimited log exports and reports minutes and
/// bundle-hours whose error count exceeds the alert threshold.
#[derive(Parser, Debug)]
#[command(name = "spikewatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the configuration file (spikewatch.toml, or a legacy .json file).
    #[arg(short, long, default_value = "/etc/spikewatch/spikewatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (text, json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Run the pipeline once on a single file, emit both reports and exit.
    #[arg(long, value_name = "FILE", conflicts_with = "validate")]
    pub analyze: Option<PathBuf>,
}
