//! Health gate that stops attempts after repeated chain exhaustion.
//!
//! There is no background timer: the cooldown is a deadline checked lazily
//! in [`CircuitBreaker::allow`], so the state machine is driven purely by
//! calls and the injected clock.

use crate::clock::{Clock, SystemClock};
use crate::config::BreakerConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { until: Instant },
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
}

pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            threshold: config.failure_threshold.max(1),
            cooldown: config.cooldown(),
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
            }),
        }
    }

    /// Whether a new attempt may start. Closes an expired open circuit.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open { until } => {
                if self.clock.now() >= until {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    info!("circuit closed after cooldown");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Count one exhausted action. Ignored while open.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        if let CircuitState::Open { .. } = inner.state {
            return;
        }
        inner.failures += 1;
        if inner.failures >= self.threshold {
            inner.state = CircuitState::Open {
                until: self.clock.now() + self.cooldown,
            };
            warn!(
                failures = inner.failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "circuit opened"
            );
        }
    }

    /// Reset the failure count. An open circuit stays open until its cooldown ends.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Closed {
            inner.failures = 0;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failures(&self) -> u32 {
        self.inner.lock().failures
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state(), CircuitState::Open { .. })
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("threshold", &self.threshold)
            .field("cooldown", &self.cooldown)
            .field("state", &inner.state)
            .field("failures", &inner.failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn breaker(threshold: u32, cooldown_ms: u64) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = BreakerConfig {
            failure_threshold: threshold,
            cooldown_ms,
        };
        (CircuitBreaker::with_clock(&config, clock.clone()), clock)
    }

    #[test]
    fn opens_exactly_at_threshold() {
        let (cb, _) = breaker(3, 1000);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.allow());
        assert_eq!(cb.failures(), 2);
        cb.record_failure();
        assert!(cb.is_open());
        assert!(!cb.allow());
    }

    #[test]
    fn failures_do_not_accumulate_while_open() {
        let (cb, _) = breaker(2, 1000);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_open());
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.failures(), 2);
    }

    #[test]
    fn closes_after_cooldown_with_zero_failures() {
        let (cb, clock) = breaker(1, 60_000);
        cb.record_failure();
        assert!(!cb.allow());

        clock.advance(Duration::from_millis(59_999));
        assert!(!cb.allow());

        clock.advance(Duration::from_millis(1));
        assert!(cb.allow());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failures(), 0);
    }

    #[test]
    fn success_resets_counter_when_closed() {
        let (cb, _) = breaker(5, 1000);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failures(), 0);
    }

    #[test]
    fn success_cannot_force_close() {
        let (cb, _) = breaker(1, 1000);
        cb.record_failure();
        cb.record_success();
        assert!(cb.is_open());
        assert!(!cb.allow());
    }
}
