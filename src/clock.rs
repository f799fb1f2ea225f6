//! Time source used by the gateway breaker and the stop poll loop.
//!
//! Both consumers take the clock as an injected trait object so tests can
//! drive cool-down windows and poll ceilings without real waiting.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// Future returned by [`Clock::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Monotonic time source with an asynchronous sleep.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Suspends the caller for `duration`.
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}

/// Wall-clock implementation backed by the Tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(duration))
    }
}
