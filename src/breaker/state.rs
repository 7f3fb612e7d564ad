//! Circuit state and diagnostic snapshot

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Circuit is closed (allowing requests)
    #[default]
    Closed,
    /// Circuit is open (rejecting requests until the cooldown elapses)
    Open,
    /// Circuit is half-open (letting probe requests through)
    HalfOpen,
}

impl CircuitState {
    /// Lowercase label used in status messages
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF-OPEN",
        };
        f.write_str(label)
    }
}

/// Point-in-time view of a breaker, for logging and diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    /// Breaker name
    pub name: String,
    /// Current state
    pub state: CircuitState,
    /// Failures counted in the current closed/half-open window
    pub failure_count: u32,
    /// Successes counted in the current half-open window
    pub success_count: u32,
    /// Time until a probe is allowed (open state only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in: Option<Duration>,
}

impl BreakerSnapshot {
    /// One-line human readable status
    #[must_use]
    pub fn status_message(&self) -> String {
        match self.state {
            CircuitState::Closed => format!(
                "Breaker '{}' is closed ({} recent failures)",
                self.name, self.failure_count
            ),
            CircuitState::Open => {
                let secs = self.retry_in.unwrap_or_default().as_secs_f64();
                format!(
                    "Breaker '{}' circuit is open, retry in {secs:.1} seconds",
                    self.name
                )
            }
            CircuitState::HalfOpen => format!(
                "Breaker '{}' is half-open, testing recovery ({} successes, {} failures)",
                self.name, self.success_count, self.failure_count
            ),
        }
    }
}
