//! Demo drivers for the `tripswitch` binary
//!
//! Two ready-made actions: an HTTP GET returning JSON, and a scripted action
//! whose outcomes are read from a string. [`drive`] runs a breaker through a
//! fixed number of calls and hands each outcome to a callback as it happens.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::info;

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::config::BreakerConfig;
use crate::{Error, Result};

/// Message served by the HTTP probe while the circuit is open
pub const FALLBACK_MESSAGE: &str = "Fallback: service down";

/// Breaker around a JSON GET of `url`, falling back to [`FALLBACK_MESSAGE`]
pub fn http_breaker(
    config: &BreakerConfig,
    client: reqwest::Client,
    url: String,
) -> CircuitBreaker<(), Value> {
    CircuitBreaker::new(config, move |()| {
        let request = client.get(&url);
        async move {
            let response = request.send().await?.error_for_status()?;
            Ok::<_, Error>(response.json::<Value>().await?)
        }
    })
    .with_fallback_value(json!({ "message": FALLBACK_MESSAGE }))
}

/// One scripted action outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Return a value
    Succeed,
    /// Return an error
    Fail,
    /// Never settle (always loses the timeout race)
    Hang,
}

impl TryFrom<char> for Step {
    type Error = Error;

    fn try_from(c: char) -> Result<Self> {
        match c.to_ascii_lowercase() {
            's' => Ok(Self::Succeed),
            'f' => Ok(Self::Fail),
            't' => Ok(Self::Hang),
            other => Err(Error::Config(format!(
                "invalid script step '{other}' (expected s, f or t)"
            ))),
        }
    }
}

/// Parse a script such as `"ffst"`; whitespace is ignored
pub fn parse_script(script: &str) -> Result<Vec<Step>> {
    let steps = script
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(Step::try_from)
        .collect::<Result<Vec<_>>>()?;

    if steps.is_empty() {
        return Err(Error::Config("script must contain at least one step".to_string()));
    }
    Ok(steps)
}

/// Breaker around an action that plays `steps` in order, one per invocation.
///
/// Once the script is exhausted the last step repeats.
pub fn scripted_breaker(config: &BreakerConfig, steps: Vec<Step>) -> CircuitBreaker<(), String> {
    let steps: Arc<[Step]> = steps.into();
    let cursor = Arc::new(AtomicUsize::new(0));

    CircuitBreaker::new(config, move |()| {
        let n = cursor.fetch_add(1, Ordering::Relaxed);
        let step = steps
            .get(n)
            .or_else(|| steps.last())
            .copied()
            .unwrap_or(Step::Succeed);

        async move {
            match step {
                Step::Succeed => Ok(format!("ok #{}", n + 1)),
                Step::Fail => Err(anyhow::anyhow!("scripted failure #{}", n + 1)),
                Step::Hang => std::future::pending().await,
            }
        }
    })
}

/// What a single driven call observed
#[derive(Debug)]
pub struct CallRecord<T> {
    /// 1-based call number
    pub index: u32,
    /// Breaker state after the call returned
    pub state: CircuitState,
    /// Call outcome
    pub outcome: Result<T>,
}

/// Make `calls` calls through `breaker`, pausing `interval` between them.
///
/// `on_call` sees every call as soon as it returns.
pub async fn drive<T, F>(
    breaker: &CircuitBreaker<(), T>,
    calls: u32,
    interval: Duration,
    mut on_call: F,
) where
    T: Send + 'static,
    F: FnMut(CallRecord<T>),
{
    for index in 1..=calls {
        if index > 1 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }

        let outcome = breaker.call(()).await;
        let state = breaker.state();
        info!(
            call = index,
            state = %state,
            ok = outcome.is_ok(),
            "Call completed"
        );
        on_call(CallRecord {
            index,
            state,
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> BreakerConfig {
        BreakerConfig {
            name: "scripted".to_string(),
            failure_threshold: 1,
            success_threshold: 1,
            cooldown: Duration::from_millis(100),
            timeout: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_script() {
        assert_eq!(
            parse_script("s f T").unwrap(),
            vec![Step::Succeed, Step::Fail, Step::Hang]
        );
        assert!(parse_script("sx").is_err());
        assert!(parse_script("  ").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_run_trips_and_recovers() {
        let breaker = scripted_breaker(&config(), parse_script("fts").unwrap());
        let mut records = Vec::new();
        drive(&breaker, 4, Duration::from_millis(200), |r| records.push(r)).await;

        let states: Vec<_> = records.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            vec![
                CircuitState::Closed,
                CircuitState::Open,
                CircuitState::Closed,
                CircuitState::Closed,
            ]
        );
        assert!(matches!(records[0].outcome, Err(Error::ActionFailed(_))));
        assert!(records[1].outcome.as_ref().unwrap_err().is_rejection());
        assert_eq!(records[2].outcome.as_ref().unwrap(), "ok #3");
        assert_eq!(records[3].outcome.as_ref().unwrap(), "ok #4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_step_repeats() {
        let breaker = scripted_breaker(&config(), vec![Step::Succeed]);
        let mut records = Vec::new();
        drive(&breaker, 3, Duration::ZERO, |r| records.push(r)).await;
        assert_eq!(records[2].outcome.as_ref().unwrap(), "ok #3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_call_reported_before_the_next_starts() {
        let breaker = scripted_breaker(&config(), vec![Step::Succeed]);
        let started = tokio::time::Instant::now();
        let mut seen = Vec::new();

        drive(&breaker, 3, Duration::from_millis(200), |r| {
            seen.push((r.index, started.elapsed()));
        })
        .await;

        let indices: Vec<_> = seen.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        // Reported at call time, not after the whole run
        assert!(seen[0].1 < Duration::from_millis(200));
        assert!(seen[1].1 >= Duration::from_millis(200) && seen[1].1 < Duration::from_millis(400));
    }
}
