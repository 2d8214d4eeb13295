use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::carrier::{CarrierError, CarrierId};

/// Breaker state for one carrier's outbound calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Set while the single half-open trial call is outstanding.
    trial_started_at: Option<Instant>,
}

/// Short-circuits calls to a carrier that keeps failing.
///
/// After `failure_threshold` consecutive unavailability failures the breaker
/// opens and every call fails fast with [`CarrierError::rate_limited`] until
/// `open_timeout` has passed. A single trial call is then let through and its
/// outcome closes or re-opens the breaker; concurrent callers keep failing
/// fast. A trial that never reports back frees its slot after `open_timeout`.
#[derive(Debug)]
pub struct CircuitBreaker {
    carrier: CarrierId,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(carrier: CarrierId, config: CircuitBreakerConfig) -> Self {
        Self {
            carrier,
            config,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_started_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admits a call or fails fast while open.
    pub fn guard(&self) -> Result<(), CarrierError> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => {
                let trial_pending = inner
                    .trial_started_at
                    .is_some_and(|started| started.elapsed() < self.config.open_timeout);
                if trial_pending {
                    Err(self.fail_fast("is waiting on a trial call"))
                } else {
                    inner.trial_started_at = Some(Instant::now());
                    Ok(())
                }
            }
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_some_and(|opened_at| opened_at.elapsed() >= self.config.open_timeout);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.opened_at = None;
                    inner.trial_started_at = Some(Instant::now());
                    info!(carrier = %self.carrier, "circuit half-open, admitting trial call");
                    Ok(())
                } else {
                    Err(self.fail_fast("is open after repeated failures"))
                }
            }
        }
    }

    fn fail_fast(&self, reason: &str) -> CarrierError {
        CarrierError::rate_limited(self.carrier, format!("{} circuit {reason}", self.carrier))
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!(carrier = %self.carrier, "circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_started_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        if inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.config.failure_threshold
        {
            if inner.state != CircuitState::Open {
                warn!(
                    carrier = %self.carrier,
                    failures = inner.consecutive_failures,
                    "circuit opened"
                );
            }
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
        inner.trial_started_at = None;
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::CarrierErrorKind;

    #[test]
    fn opens_after_threshold_and_fails_fast() {
        let breaker = CircuitBreaker::new(
            CarrierId::LtlFreight,
            CircuitBreakerConfig {
                failure_threshold: 2,
                open_timeout: Duration::from_secs(30),
            },
        );

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        let error = breaker.guard().expect_err("open circuit rejects");
        assert_eq!(error.kind(), CarrierErrorKind::RateLimited);
        assert_eq!(error.carrier(), CarrierId::LtlFreight);
    }

    #[test]
    fn successful_trial_call_closes_half_open_circuit() {
        let breaker = CircuitBreaker::new(
            CarrierId::PostalParcel,
            CircuitBreakerConfig {
                failure_threshold: 1,
                open_timeout: Duration::from_millis(1),
            },
        );

        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(breaker.guard().is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn failed_trial_call_reopens() {
        let breaker = CircuitBreaker::new(
            CarrierId::PostalParcel,
            CircuitBreakerConfig {
                failure_threshold: 3,
                open_timeout: Duration::from_millis(1),
            },
        );

        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(5));
        assert!(breaker.guard().is_ok());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_admits_one_caller_at_a_time() {
        let breaker = CircuitBreaker::new(
            CarrierId::PostalParcel,
            CircuitBreakerConfig {
                failure_threshold: 1,
                open_timeout: Duration::from_millis(50),
            },
        );

        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.guard().is_ok());

        let concurrent = breaker.guard().expect_err("second caller fails fast");
        assert_eq!(concurrent.kind(), CarrierErrorKind::RateLimited);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert!(breaker.guard().is_ok());
        assert!(breaker.guard().is_ok());
    }

    #[test]
    fn abandoned_trial_call_frees_its_slot_after_timeout() {
        let breaker = CircuitBreaker::new(
            CarrierId::CommercialParcel,
            CircuitBreakerConfig {
                failure_threshold: 1,
                open_timeout: Duration::from_millis(20),
            },
        );

        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.guard().is_ok());
        assert!(breaker.guard().is_err());

        // The first trial never reported its outcome.
        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.guard().is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }
}
