//! Circuit breaker for upstream service calls
//!
//! After `failure_threshold` consecutive failures a service is suspended for
//! `cooldown`; calls made while suspended fail fast without network I/O.
//! Once the cooldown elapses a single trial call is admitted (half-open):
//! success closes the breaker, failure suspends the service again.
//!
//! Calls are admitted through a [`Permit`]. A trial permit dropped without
//! an outcome, for instance when the request future is cancelled, frees the
//! half-open slot so the next caller becomes the trial.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::Service;
use crate::{Error, Result};

/// Circuit breaker settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,
    /// How long the breaker stays open
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow normally
    Closed,
    /// Calls fail fast until the cooldown elapses
    Open,
    /// One trial call is in flight
    HalfOpen,
}

impl BreakerState {
    /// Stable lowercase name used in readiness output
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct Inner {
    consecutive_failures: u32,
    open_until: Option<Instant>,
    trial_in_flight: bool,
}

/// Per-service circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    service: Service,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker for `service`
    #[must_use]
    pub const fn new(service: Service, config: BreakerConfig) -> Self {
        Self {
            service,
            config,
            inner: Mutex::new(Inner {
                consecutive_failures: 0,
                open_until: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Admit a call, or fail fast while the breaker is open
    ///
    /// # Errors
    ///
    /// Returns `Error::CircuitOpen` while the service is suspended
    pub fn admit(&self) -> Result<Permit<'_>> {
        self.admit_at(Instant::now())
    }

    /// Record a call that reached the service and got an answer
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.open_until.is_some() {
            tracing::info!(service = %self.service, "upstream recovered, closing circuit");
        }
        inner.consecutive_failures = 0;
        inner.open_until = None;
        inner.trial_in_flight = false;
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.state_at(Instant::now())
    }

    fn admit_at(&self, now: Instant) -> Result<Permit<'_>> {
        let trial = self.check_at(now)?;
        Ok(Permit {
            breaker: self,
            trial,
            settled: AtomicBool::new(false),
        })
    }

    /// Returns whether the admitted call is the half-open trial
    fn check_at(&self, now: Instant) -> Result<bool> {
        let mut inner = self.lock();
        match inner.open_until {
            None => Ok(false),
            Some(until) if now < until => Err(Error::CircuitOpen(self.service)),
            Some(_) if inner.trial_in_flight => Err(Error::CircuitOpen(self.service)),
            Some(_) => {
                tracing::debug!(service = %self.service, "cooldown elapsed, admitting trial call");
                inner.trial_in_flight = true;
                Ok(true)
            }
        }
    }

    fn abandon_trial(&self) {
        let mut inner = self.lock();
        if inner.trial_in_flight {
            tracing::debug!(service = %self.service, "trial call abandoned, releasing slot");
            inner.trial_in_flight = false;
        }
    }

    fn record_failure_at(&self, now: Instant) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let reopen = inner.trial_in_flight;
        if reopen || inner.consecutive_failures >= self.config.failure_threshold {
            inner.open_until = Some(now + self.config.cooldown);
            inner.trial_in_flight = false;
            tracing::warn!(
                service = %self.service,
                failures = inner.consecutive_failures,
                cooldown_secs = self.config.cooldown.as_secs(),
                "opening circuit"
            );
        }
    }

    fn state_at(&self, now: Instant) -> BreakerState {
        let inner = self.lock();
        match inner.open_until {
            None => BreakerState::Closed,
            Some(_) if inner.trial_in_flight => BreakerState::HalfOpen,
            Some(until) if now < until => BreakerState::Open,
            Some(_) => BreakerState::HalfOpen,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // State is a few counters; a poisoned lock still holds usable values
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Admission for one upstream call
///
/// Report the outcome with [`Permit::success`] or [`Permit::failure`].
#[must_use]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: AtomicBool,
}

impl Permit<'_> {
    /// The service answered
    pub fn success(&self) {
        self.settled.store(true, Ordering::Release);
        self.breaker.record_success();
    }

    /// The call failed
    pub fn failure(&self) {
        self.settled.store(true, Ordering::Release);
        self.breaker.record_failure();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled.load(Ordering::Acquire) {
            self.breaker.abandon_trial();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            Service::Completion,
            BreakerConfig {
                failure_threshold: threshold,
                cooldown: Duration::from_millis(cooldown_ms),
            },
        )
    }

    #[test]
    fn stays_closed_below_threshold() {
        let b = breaker(3, 1000);
        b.record_failure();
        b.record_failure();
        assert!(b.admit().is_ok());
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn opens_at_threshold_and_fails_fast() {
        let b = breaker(2, 60_000);
        b.record_failure();
        b.record_failure();

        assert_eq!(b.state(), BreakerState::Open);
        let err = b.admit().unwrap_err();
        assert!(matches!(err, Error::CircuitOpen(Service::Completion)));
    }

    #[test]
    fn success_resets_failure_count() {
        let b = breaker(2, 60_000);
        b.record_failure();
        b.record_success();
        b.record_failure();
        assert!(b.admit().is_ok());
    }

    #[test]
    fn admits_single_trial_after_cooldown() {
        let b = breaker(1, 10);
        let start = Instant::now();
        b.record_failure_at(start);

        let later = start + Duration::from_millis(20);
        let trial = b.admit_at(later).unwrap();
        assert_eq!(b.state_at(later), BreakerState::HalfOpen);
        // A second caller during the trial is still rejected
        assert!(b.admit_at(later).is_err());
        trial.success();
    }

    #[test]
    fn dropped_trial_frees_the_slot() {
        let b = breaker(1, 10);
        let start = Instant::now();
        b.record_failure_at(start);

        let later = start + Duration::from_millis(20);
        drop(b.admit_at(later).unwrap());

        let retry = b.admit_at(later).unwrap();
        retry.success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn settled_permit_does_not_release_next_trial() {
        let b = breaker(1, 60_000);
        let start = Instant::now();
        b.record_failure_at(start);

        let later = start + Duration::from_secs(61);
        let first = b.admit_at(later).unwrap();
        first.failure();
        drop(first);

        assert_eq!(b.state(), BreakerState::Open);
        assert!(b.admit().is_err());
    }

    #[test]
    fn failed_trial_reopens() {
        let b = breaker(3, 10);
        let start = Instant::now();
        for _ in 0..3 {
            b.record_failure_at(start);
        }

        let later = start + Duration::from_millis(20);
        let trial = b.admit_at(later).unwrap();
        b.record_failure_at(later);
        drop(trial);

        assert_eq!(b.state_at(later), BreakerState::Open);
        assert!(b.check_at(later + Duration::from_millis(5)).is_err());
    }

    #[test]
    fn successful_trial_closes() {
        let b = breaker(1, 10);
        let start = Instant::now();
        b.record_failure_at(start);

        b.admit_at(start + Duration::from_millis(20))
            .unwrap()
            .success();

        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.admit().is_ok());
    }
}
