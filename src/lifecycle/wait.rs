//! Bounded wait for a stopped build to report completion.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::CleanupPolicy;
use crate::gateway::{JobName, RemoteClient};

use super::{ExecutorError, JenkinsExecutor};

/// Progress of the completion poll. Each step returns a new value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct PollState {
    pub(crate) elapsed: Duration,
    pub(crate) interval: Duration,
    pub(crate) ceiling: Duration,
    pub(crate) checks: u32,
}

impl PollState {
    pub(crate) const fn new(policy: CleanupPolicy) -> Self {
        Self {
            elapsed: Duration::ZERO,
            interval: policy.watch_interval,
            ceiling: policy.time_limit,
            checks: 0,
        }
    }

    pub(crate) fn exhausted(self) -> bool {
        self.elapsed >= self.ceiling
    }

    #[must_use]
    pub(crate) const fn checked(self, elapsed: Duration) -> Self {
        Self {
            elapsed,
            checks: self.checks.saturating_add(1),
            ..self
        }
    }
}

impl<C: RemoteClient> JenkinsExecutor<C> {
    /// Polls the job until build `number` has completed. Sleeps one interval
    /// before every check, and gives up once the elapsed time reaches the
    /// cleanup time limit. Returns the number of checks made.
    pub(super) async fn wait_for_completion(
        &self,
        job: &JobName,
        number: u64,
    ) -> Result<u32, ExecutorError> {
        let started = self.clock.now();
        let mut poll = PollState::new(self.cleanup);

        while !poll.exhausted() {
            self.clock.sleep(poll.interval).await;
            let info = self.gateway.job_info(job).await?;
            poll = poll.checked(self.clock.now().saturating_duration_since(started));
            if info.has_completed(number) {
                debug!(%job, number, checks = poll.checks, "stopped build completed");
                return Ok(poll.checks);
            }
            debug!(%job, number, elapsed_ms = poll.elapsed.as_millis(), "build still running");
        }

        warn!(
            %job,
            number,
            waited_secs = poll.elapsed.as_secs(),
            "stopped build did not complete in time; leaving job defined"
        );
        Err(ExecutorError::CleanupTimeout {
            job: job.clone(),
            waited: poll.elapsed,
        })
    }
}
