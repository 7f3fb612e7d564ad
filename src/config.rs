//! Configuration management

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::breaker::CircuitState;
use crate::{Error, Result};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "TRIPSWITCH_";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Circuit breaker configuration
    pub breaker: BreakerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Label used in logs and status messages
    pub name: String,
    /// Failures tolerated before opening; the breaker opens once this is exceeded
    pub failure_threshold: u32,
    /// Successes required while half-open to close
    pub success_threshold: u32,
    /// Time the circuit stays open before a probe is allowed
    #[serde(with = "millis_serde")]
    pub cooldown: Duration,
    /// Maximum time a single action invocation may take
    #[serde(with = "millis_serde")]
    pub timeout: Duration,
    /// State the breaker starts in
    pub initial_state: CircuitState,
    /// Clear the failure count when an action succeeds while closed
    pub reset_failures_on_success: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            failure_threshold: 4,
            success_threshold: 3,
            cooldown: Duration::from_millis(3000),
            timeout: Duration::from_millis(5000),
            initial_state: CircuitState::Closed,
            reset_failures_on_success: true,
        }
    }
}

impl BreakerConfig {
    /// Check the configuration for values the breaker cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config(format!(
                "breaker '{}': timeout must be greater than zero",
                self.name
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from defaults, an optional YAML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (TRIPSWITCH_ prefix)
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::from_figment(&figment)
    }

    fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.breaker.validate()?;
        tracing::debug!(breaker = %config.breaker.name, "Configuration loaded");

        Ok(config)
    }
}

/// Duration serde helper; bare numbers are milliseconds
pub mod millis_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    /// Serialize Duration as milliseconds (e.g., "3000ms")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    /// Deserialize a duration (e.g., 3000, "3000", "250ms", "3s", "1m")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the value cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
            Raw::Text(s) => parse(s.trim()).map_err(serde::de::Error::custom),
        }
    }

    /// Parse "250ms", "3s", "1m" or bare milliseconds
    pub fn parse(s: &str) -> Result<Duration, String> {
        let invalid = |e: std::num::ParseIntError| format!("invalid duration '{s}': {e}");

        // "ms" has to be checked before the single-letter suffixes
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim().parse::<u64>().map(Duration::from_millis).map_err(invalid)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim().parse::<u64>().map(Duration::from_secs).map_err(invalid)
        } else if let Some(mins) = s.strip_suffix('m') {
            let m = mins.trim().parse::<u64>().map_err(invalid)?;
            m.checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| format!("invalid duration '{s}': too large"))
        } else {
            s.parse::<u64>().map(Duration::from_millis).map_err(invalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = BreakerConfig::default();
        assert_eq!(config.failure_threshold, 4);
        assert_eq!(config.success_threshold, 3);
        assert_eq!(config.cooldown, Duration::from_millis(3000));
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert_eq!(config.initial_state, CircuitState::Closed);
        assert!(config.reset_failures_on_success);
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(millis_serde::parse("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(millis_serde::parse("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(millis_serde::parse("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(millis_serde::parse("1500").unwrap(), Duration::from_millis(1500));
        assert!(millis_serde::parse("soon").is_err());
        assert!(millis_serde::parse("307445734561825861m").is_err());
    }

    #[test]
    fn test_breaker_deserialized_from_yaml() {
        let yaml = r#"
breaker:
  name: payments
  failure_threshold: 1
  cooldown: 0
  timeout: "2s"
  initial_state: half-open
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.breaker.name, "payments");
        assert_eq!(config.breaker.failure_threshold, 1);
        assert_eq!(config.breaker.success_threshold, 3);
        assert_eq!(config.breaker.cooldown, Duration::ZERO);
        assert_eq!(config.breaker.timeout, Duration::from_secs(2));
        assert_eq!(config.breaker.initial_state, CircuitState::HalfOpen);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_serialized_config_reloads_identically() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("3000ms"));
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_load_from_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "tripswitch.yaml",
                "logging:\n  format: json\nbreaker:\n  success_threshold: 1\n",
            )?;

            let config =
                Config::load(Some(Path::new("tripswitch.yaml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.logging.format, "json");
            assert_eq!(config.logging.level, "info");
            assert_eq!(config.breaker.success_threshold, 1);
            assert_eq!(config.breaker.failure_threshold, 4);
            Ok(())
        });
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = Config::load(Some(Path::new("/nonexistent/tripswitch.yaml"))).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TRIPSWITCH_BREAKER__FAILURE_THRESHOLD", "9");
            jail.set_env("TRIPSWITCH_LOGGING__LEVEL", "debug");
            let config = Config::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.breaker.failure_threshold, 9);
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_oversized_minutes_is_config_error() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TRIPSWITCH_BREAKER__COOLDOWN", "307445734561825861m");
            let err = Config::load(None).unwrap_err();
            assert!(matches!(err, Error::Config(msg) if msg.contains("too large")));
            Ok(())
        });
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = BreakerConfig {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
