//! Circuit breaker: state machine, call dispatch and diagnostics

mod circuit_breaker;
mod state;

pub use circuit_breaker::CircuitBreaker;
pub use state::{BreakerSnapshot, CircuitState};
