//! Tripswitch Library
//!
//! Async circuit breaker guarding a fallible operation.
//!
//! # Features
//!
//! - **State machine**: closed, open and half-open with threshold bookkeeping
//! - **Timeouts**: every attempt races a deadline; slow attempts count as failures
//! - **Fallbacks**: degraded-mode responses while the circuit is open
//! - **Diagnostics**: snapshots and status messages for logging
//!
//! Configuration is layered (defaults, YAML file, `TRIPSWITCH_` environment)
//! and the `tripswitch` binary drives a breaker against an HTTP endpoint or
//! a scripted simulation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod breaker;
pub mod cli;
pub mod config;
pub mod demo;
pub mod error;

pub use breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::Config(format!("Invalid log level '{level}': {e}")))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
