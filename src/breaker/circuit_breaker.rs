//! Circuit breaker implementation

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::state::{BreakerSnapshot, CircuitState};
use crate::config::BreakerConfig;
use crate::{Error, Result};

type ActionFn<Args, T> = Box<dyn Fn(Args) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;
type FallbackFn<Args, T> = Box<dyn Fn(Args) -> BoxFuture<'static, T> + Send + Sync>;

/// Counters and timestamps, mutated only while the lock is held
#[derive(Debug, Default)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    /// Set on entering open
    last_failure_time: Option<Instant>,
    /// `last_failure_time + cooldown`; gate for leaving open
    next_attempt_time: Option<Instant>,
}

/// Circuit breaker guarding one asynchronous action.
///
/// Every [`call`](Self::call) re-evaluates the state in three guarded phases
/// (closed, open, half-open). A phase may change the state, in which case a
/// later phase of the same call picks it up: a failure that trips the
/// breaker while closed is routed through the open check, and an open
/// breaker whose cooldown has elapsed probes the action within that call.
///
/// Arguments are passed as a single value; use a tuple for several. They
/// are cloned because one call may reach the action twice and the fallback
/// once.
///
/// # Example
///
/// ```rust,no_run
/// use tripswitch::breaker::CircuitBreaker;
/// use tripswitch::config::BreakerConfig;
///
/// # async fn run() -> tripswitch::Result<()> {
/// let breaker = CircuitBreaker::new(&BreakerConfig::default(), |id: u64| async move {
///     anyhow::Ok(format!("record {id}"))
/// })
/// .with_fallback_value("cached record".to_string());
///
/// let record = breaker.call(7).await?;
/// # Ok(())
/// # }
/// ```
pub struct CircuitBreaker<Args, T> {
    name: String,
    failure_threshold: u32,
    success_threshold: u32,
    cooldown: Duration,
    timeout: Duration,
    reset_failures_on_success: bool,
    inner: Mutex<Inner>,
    action: ActionFn<Args, T>,
    fallback: Option<FallbackFn<Args, T>>,
}

impl<Args, T> CircuitBreaker<Args, T>
where
    Args: Clone + Send + 'static,
    T: Send + 'static,
{
    /// Create a new circuit breaker around `action`
    pub fn new<F, Fut, E>(config: &BreakerConfig, action: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let mut inner = Inner {
            state: config.initial_state,
            ..Inner::default()
        };

        // An open breaker always carries its reopen deadline
        if config.initial_state == CircuitState::Open {
            let now = Instant::now();
            inner.last_failure_time = Some(now);
            inner.next_attempt_time = Some(now + config.cooldown);
        }

        Self {
            name: config.name.clone(),
            failure_threshold: config.failure_threshold,
            success_threshold: config.success_threshold,
            cooldown: config.cooldown,
            timeout: config.timeout,
            reset_failures_on_success: config.reset_failures_on_success,
            inner: Mutex::new(inner),
            action: Box::new(move |args| {
                action(args)
                    .map(|r| r.map_err(Into::<anyhow::Error>::into))
                    .boxed()
            }),
            fallback: None,
        }
    }

    /// Serve rejected calls from `fallback` instead of failing them
    #[must_use]
    pub fn with_fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.fallback = Some(Box::new(move |args| fallback(args).boxed()));
        self
    }

    /// Serve rejected calls with a fixed value
    #[must_use]
    pub fn with_fallback_value(self, value: T) -> Self
    where
        T: Clone + Sync,
    {
        self.with_fallback(move |_| std::future::ready(value.clone()))
    }

    /// Run `args` through the breaker.
    ///
    /// Returns the action's value, the fallback's value, or an error:
    /// [`Error::ActionFailed`] / [`Error::Timeout`] when the attempt made by
    /// this call failed, and [`Error::CircuitOpen`] when the call was
    /// rejected with no fallback configured.
    #[tracing::instrument(skip_all, fields(breaker = %self.name))]
    pub async fn call(&self, args: Args) -> Result<T> {
        let mut outcome = None;

        if self.state() == CircuitState::Closed {
            trace!("Circuit closed, invoking action");
            let result = self.attempt(args.clone()).await;
            self.record(&result);
            outcome = Some(result);
        }

        // The attempt above may have just opened the circuit
        if self.state() == CircuitState::Open && !self.try_half_open() {
            return self.reject(args).await;
        }

        if self.state() == CircuitState::HalfOpen {
            debug!("Circuit half-open, allowing probe request");
            let result = self.attempt(args.clone()).await;
            self.record(&result);
            outcome = Some(result);
        }

        match outcome {
            Some(result) => result,
            // Another call reopened the circuit between our phases
            None => self.reject(args).await,
        }
    }

    /// Invoke the action, racing it against the timeout.
    ///
    /// On timeout the action future is dropped, which cancels it.
    async fn attempt(&self, args: Args) -> Result<T> {
        match tokio::time::timeout(self.timeout, (self.action)(args)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                debug!(error = %e, "Action failed");
                Err(e.into())
            }
            Err(_elapsed) => {
                warn!(timeout_ms = self.timeout.as_millis(), "Action timed out");
                Err(Error::Timeout(self.timeout))
            }
        }
    }

    async fn reject(&self, args: Args) -> Result<T> {
        match &self.fallback {
            Some(fallback) => {
                warn!("Circuit open, serving fallback");
                Ok(fallback(args).await)
            }
            None => {
                warn!("Circuit open, rejecting request");
                Err(Error::CircuitOpen(self.status_message()))
            }
        }
    }
}

impl<Args, T> CircuitBreaker<Args, T> {
    /// Breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Failures counted in the current closed/half-open window
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Successes counted in the current half-open window
    pub fn success_count(&self) -> u32 {
        self.inner.lock().success_count
    }

    /// When the breaker last opened
    pub fn last_failure_time(&self) -> Option<Instant> {
        self.inner.lock().last_failure_time
    }

    /// Earliest instant at which an open breaker lets a probe through
    pub fn next_attempt_time(&self) -> Option<Instant> {
        self.inner.lock().next_attempt_time
    }

    /// Consistent view of state and counters
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        let retry_in = match inner.state {
            CircuitState::Open => inner
                .next_attempt_time
                .map(|at| at.saturating_duration_since(Instant::now())),
            _ => None,
        };

        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            retry_in,
        }
    }

    /// One-line human readable status
    pub fn status_message(&self) -> String {
        self.snapshot().status_message()
    }

    /// Move an open breaker to half-open once the cooldown has elapsed.
    ///
    /// Returns `false` if the breaker is still cooling down.
    fn try_half_open(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return true;
        }

        let now = Instant::now();
        if inner.next_attempt_time.is_none_or(|at| now >= at) {
            debug!("Cooldown elapsed, transitioning to half-open");
            self.transition_to(&mut inner, CircuitState::HalfOpen, now);
            true
        } else {
            false
        }
    }

    /// Count the outcome of an attempt against whatever state is current now
    fn record(&self, result: &Result<T>) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        match (inner.state, result.is_ok()) {
            (CircuitState::Closed, true) => {
                if self.reset_failures_on_success && inner.failure_count > 0 {
                    inner.failure_count = 0;
                    trace!("Success in closed state, reset failure count");
                }
            }
            (CircuitState::HalfOpen, true) => {
                inner.success_count = inner.success_count.saturating_add(1);
                debug!(
                    successes = inner.success_count,
                    threshold = self.success_threshold,
                    "Success in half-open state"
                );
                if inner.success_count >= self.success_threshold {
                    self.transition_to(&mut inner, CircuitState::Closed, now);
                }
            }
            (state @ (CircuitState::Closed | CircuitState::HalfOpen), false) => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                warn!(
                    failures = inner.failure_count,
                    threshold = self.failure_threshold,
                    state = %state,
                    "Failure recorded"
                );
                if inner.failure_count > self.failure_threshold {
                    self.transition_to(&mut inner, CircuitState::Open, now);
                }
            }
            (CircuitState::Open, _) => {
                trace!("Outcome recorded in open state (ignored)");
            }
        }
    }

    /// Transition to a new state, applying its entry resets
    fn transition_to(&self, inner: &mut Inner, new_state: CircuitState, now: Instant) {
        let old_state = inner.state;
        inner.state = new_state;

        match new_state {
            CircuitState::Open => {
                warn!(
                    breaker = %self.name,
                    from = %old_state,
                    failures = inner.failure_count,
                    cooldown_ms = self.cooldown.as_millis(),
                    "Circuit breaker opened"
                );
                inner.last_failure_time = Some(now);
                inner.next_attempt_time = Some(now + self.cooldown);
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
                debug!(breaker = %self.name, "Circuit breaker half-open");
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.last_failure_time = None;
                inner.next_attempt_time = None;
                info!(breaker = %self.name, "Circuit breaker closed");
            }
        }
    }
}

impl<Args, T> fmt::Debug for CircuitBreaker<Args, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("inner", &*self.inner.lock())
            .field("has_fallback", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}
