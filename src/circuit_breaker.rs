//! # Circuit Breaker Module
//!
//! Stops calling an AI provider for a while after it failed repeatedly, so a
//! provider outage turns into fast failure replies instead of a queue of
//! requests each waiting for its timeout.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::RecoveryConfig;

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

/// Circuit breaker shared by every call to one provider
///
/// - **Closed**: calls pass through
/// - **Open**: `circuit_breaker_threshold` consecutive failures, calls fail fast
/// - after `circuit_breaker_reset_secs` the next call is let through again
#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    state: Mutex<BreakerState>,
    threshold: u32,
    reset_after: Duration,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: &RecoveryConfig) -> Self {
        Self {
            name,
            state: Mutex::new(BreakerState::default()),
            threshold: config.circuit_breaker_threshold,
            reset_after: Duration::from_secs(config.circuit_breaker_reset_secs),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `true` while calls should be rejected without reaching the provider
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.consecutive_failures < self.threshold {
            return false;
        }
        match state.last_failure {
            Some(at) if at.elapsed() < self.reset_after => true,
            _ => {
                // half-open: let the next call probe the provider
                *state = BreakerState::default();
                false
            }
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_failures += 1;
        state.last_failure = Some(Instant::now());
        if state.consecutive_failures == self.threshold {
            tracing::warn!(
                provider = self.name,
                failures = state.consecutive_failures,
                "Circuit breaker opened"
            );
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = BreakerState::default();
    }
}
