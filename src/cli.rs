//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tripswitch - drive a circuit breaker against a live endpoint or a script
#[derive(Parser, Debug)]
#[command(name = "tripswitch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "TRIPSWITCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "TRIPSWITCH_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json); overrides the config file
    #[arg(long, env = "TRIPSWITCH_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Issue guarded HTTP GET requests, falling back to a canned JSON body
    Probe {
        /// URL returning a JSON body
        #[arg(long)]
        url: String,

        /// Number of calls to make
        #[arg(short = 'n', long, default_value_t = 7)]
        calls: u32,

        /// Pause between calls, in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },

    /// Drive a scripted action: one char per invocation (s = succeed, f = fail, t = hang)
    Simulate {
        /// Outcome script
        #[arg(long, default_value = "fffffffsss")]
        script: String,

        /// Number of calls to make (defaults to the script length)
        #[arg(short = 'n', long)]
        calls: Option<u32>,

        /// Pause between calls, in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },

    /// Print the effective configuration as YAML
    Config,
}
