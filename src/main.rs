//! Tripswitch - circuit breaker demo driver
//!
//! Runs a configured breaker against an HTTP endpoint or a scripted action
//! and prints the breaker state after every call.

use std::fmt::Display;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use tripswitch::{
    cli::{Cli, Command},
    config::Config,
    demo::{self, CallRecord},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Apply CLI overrides
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    if let Err(e) = setup_tracing(&config.logging.level, Some(config.logging.format.as_str())) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Command::Probe {
            url,
            calls,
            interval_ms,
        } => run_probe(&config, url, calls, interval_ms).await,
        Command::Simulate {
            script,
            calls,
            interval_ms,
        } => run_simulate(&config, &script, calls, interval_ms).await,
        Command::Config => print_config(&config),
    }
}

/// Run guarded HTTP calls
async fn run_probe(config: &Config, url: String, calls: u32, interval_ms: u64) -> ExitCode {
    let client = match reqwest::Client::builder().build() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create HTTP client: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(url = %url, calls, breaker = %config.breaker.name, "Starting probe");

    let breaker = demo::http_breaker(&config.breaker, client, url);
    demo::drive(&breaker, calls, Duration::from_millis(interval_ms), report).await;

    println!("\n{}", breaker.status_message());
    ExitCode::SUCCESS
}

/// Run the scripted simulation
async fn run_simulate(
    config: &Config,
    script: &str,
    calls: Option<u32>,
    interval_ms: u64,
) -> ExitCode {
    let steps = match demo::parse_script(script) {
        Ok(steps) => steps,
        Err(e) => {
            eprintln!("Invalid script: {e}");
            return ExitCode::FAILURE;
        }
    };
    let calls = calls.unwrap_or_else(|| u32::try_from(steps.len()).unwrap_or(u32::MAX));

    info!(script, calls, breaker = %config.breaker.name, "Starting simulation");

    let breaker = demo::scripted_breaker(&config.breaker, steps);
    demo::drive(&breaker, calls, Duration::from_millis(interval_ms), report).await;

    println!("\n{}", breaker.status_message());
    ExitCode::SUCCESS
}

fn report<T: Display>(record: CallRecord<T>) {
    match &record.outcome {
        Ok(value) => println!("#{} [{}] {value}", record.index, record.state),
        Err(e) if e.is_rejection() => {
            println!("#{} [{}] rejected: {e}", record.index, record.state);
        }
        Err(e) if e.is_action_failure() => {
            println!("#{} [{}] failed: {e}", record.index, record.state);
        }
        Err(e) => println!("#{} [{}] error: {e}", record.index, record.state),
    }
}

fn print_config(config: &Config) -> ExitCode {
    match serde_yaml::to_string(config) {
        Ok(yaml) => {
            print!("{yaml}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize configuration: {e}");
            ExitCode::FAILURE
        }
    }
}
