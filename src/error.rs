//! Error types for tripswitch

use std::time::Duration;

use thiserror::Error;

/// Result type alias for tripswitch
pub type Result<T> = std::result::Result<T, Error>;

/// Tripswitch errors
#[derive(Error, Debug)]
pub enum Error {
    /// The guarded action returned an error
    #[error("Action failed: {0}")]
    ActionFailed(String),

    /// The guarded action did not settle within the configured timeout
    #[error("Action timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Call rejected because the circuit is open and no fallback is configured
    #[error("Circuit is open: {0}")]
    CircuitOpen(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether the call was rejected without invoking the action
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }

    /// Whether this error counts as a failed attempt of the guarded action
    #[must_use]
    pub fn is_action_failure(&self) -> bool {
        matches!(self, Self::ActionFailed(_) | Self::Timeout(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        // Alternate formatting keeps the whole context chain
        Self::ActionFailed(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_in_millis() {
        let err = Error::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Action timed out after 1500ms");
        assert!(err.is_action_failure());
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_anyhow_context_chain_preserved() {
        let err: Error = anyhow::anyhow!("connection refused")
            .context("fetching upstream")
            .into();
        assert_eq!(
            err.to_string(),
            "Action failed: fetching upstream: connection refused"
        );
    }

    #[test]
    fn test_config_error_is_neither_failure_nor_rejection() {
        let err = Error::Config("bad script".to_string());
        assert!(!err.is_action_failure());
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_circuit_open_is_rejection() {
        let err = Error::CircuitOpen("breaker 'api' retry in 3s".to_string());
        assert!(err.is_rejection());
        assert!(!err.is_action_failure());
    }
}
