//! Circuit breaker guarding the remote server.
//!
//! All state changes go through [`Breaker::apply`], which holds the lock for
//! the duration of one pure [`transition`]. The lock is never held across an
//! `.await`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::clock::Clock;

/// Thresholds controlling when the breaker opens and how long it stays open.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BreakerPolicy {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Cool-down before a trial call is admitted.
    pub reset_timeout: Duration,
    /// Upper bound on any single remote call.
    pub call_timeout: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_millis(50),
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// Observable breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BreakerState {
    /// Calls flow; `failures` counts consecutive failures.
    Closed {
        /// Consecutive failures observed so far.
        failures: u32,
    },
    /// Calls are rejected until the cool-down has elapsed.
    Open {
        /// When the breaker last opened.
        since: Instant,
    },
    /// One trial call decides whether to close or reopen.
    HalfOpen {
        /// Whether the trial call is currently running.
        trial_in_flight: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum BreakerEvent {
    Admit,
    Success,
    Failure,
    Abandoned,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Verdict {
    Admitted,
    Rejected { retry_after: Duration },
    Recorded,
}

pub(crate) fn transition(
    state: BreakerState,
    event: BreakerEvent,
    now: Instant,
    policy: &BreakerPolicy,
) -> (BreakerState, Verdict) {
    match (state, event) {
        (BreakerState::Closed { .. }, BreakerEvent::Admit) => (state, Verdict::Admitted),
        (BreakerState::Closed { .. }, BreakerEvent::Success) => {
            (BreakerState::Closed { failures: 0 }, Verdict::Recorded)
        }
        (BreakerState::Closed { failures }, BreakerEvent::Failure) => {
            let consecutive = failures.saturating_add(1);
            if consecutive >= policy.failure_threshold {
                (BreakerState::Open { since: now }, Verdict::Recorded)
            } else {
                (
                    BreakerState::Closed {
                        failures: consecutive,
                    },
                    Verdict::Recorded,
                )
            }
        }
        (BreakerState::Open { since }, BreakerEvent::Admit) => {
            let elapsed = now.saturating_duration_since(since);
            if elapsed >= policy.reset_timeout {
                (
                    BreakerState::HalfOpen {
                        trial_in_flight: true,
                    },
                    Verdict::Admitted,
                )
            } else {
                (
                    state,
                    Verdict::Rejected {
                        retry_after: policy.reset_timeout.saturating_sub(elapsed),
                    },
                )
            }
        }
        (BreakerState::HalfOpen { trial_in_flight }, BreakerEvent::Admit) => {
            if trial_in_flight {
                (
                    state,
                    Verdict::Rejected {
                        retry_after: policy.reset_timeout,
                    },
                )
            } else {
                (
                    BreakerState::HalfOpen {
                        trial_in_flight: true,
                    },
                    Verdict::Admitted,
                )
            }
        }
        (BreakerState::HalfOpen { .. }, BreakerEvent::Success) => {
            (BreakerState::Closed { failures: 0 }, Verdict::Recorded)
        }
        (BreakerState::HalfOpen { .. }, BreakerEvent::Failure) => {
            (BreakerState::Open { since: now }, Verdict::Recorded)
        }
        (BreakerState::HalfOpen { .. }, BreakerEvent::Abandoned) => (
            BreakerState::HalfOpen {
                trial_in_flight: false,
            },
            Verdict::Recorded,
        ),
        // Late results of calls admitted before the breaker opened, and
        // cancelled calls outside the half-open trial, leave state untouched.
        (
            BreakerState::Open { .. },
            BreakerEvent::Success | BreakerEvent::Failure | BreakerEvent::Abandoned,
        )
        | (BreakerState::Closed { .. }, BreakerEvent::Abandoned) => (state, Verdict::Recorded),
    }
}

/// Breaker shared by every call issued through one gateway.
pub(crate) struct Breaker {
    policy: BreakerPolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<BreakerState>,
}

impl Breaker {
    pub(crate) fn new(policy: BreakerPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            state: Mutex::new(BreakerState::Closed { failures: 0 }),
        }
    }

    pub(crate) fn state(&self) -> BreakerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Asks to issue a call. The returned permit must be settled with the
    /// call outcome; dropping it unsettled records an abandoned call.
    pub(crate) fn admit(&self) -> Result<CallPermit<'_>, Duration> {
        match self.apply(BreakerEvent::Admit) {
            Verdict::Rejected { retry_after } => Err(retry_after),
            Verdict::Admitted | Verdict::Recorded => Ok(CallPermit {
                breaker: self,
                settled: false,
            }),
        }
    }

    fn apply(&self, event: BreakerEvent) -> Verdict {
        let now = self.clock.now();
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = *guard;
        let (next, verdict) = transition(previous, event, now, &self.policy);
        *guard = next;
        drop(guard);

        match (previous, next) {
            (BreakerState::Closed { failures }, BreakerState::Open { .. }) => {
                warn!(
                    failures = failures.saturating_add(1),
                    "circuit breaker opened after consecutive failures"
                );
            }
            (BreakerState::HalfOpen { .. }, BreakerState::Open { .. }) => {
                warn!("circuit breaker trial call failed; reopening");
            }
            (BreakerState::HalfOpen { .. }, BreakerState::Closed { .. }) => {
                info!("circuit breaker closed after successful trial call");
            }
            _ => {}
        }
        verdict
    }
}

/// Admission to issue one remote call.
pub(crate) struct CallPermit<'a> {
    breaker: &'a Breaker,
    settled: bool,
}

impl CallPermit<'_> {
    pub(crate) fn succeed(mut self) {
        self.settled = true;
        self.breaker.apply(BreakerEvent::Success);
    }

    pub(crate) fn fail(mut self) {
        self.settled = true;
        self.breaker.apply(BreakerEvent::Failure);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.apply(BreakerEvent::Abandoned);
        }
    }
}
