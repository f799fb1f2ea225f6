//! Errors surfaced by the Jenkins executor.

use std::time::Duration;

use thiserror::Error;

use crate::backend::RequestError;
use crate::config::ConfigError;
use crate::gateway::{GatewayError, JobName, RemoteClientError};
use crate::script::ScriptError;
use crate::template::TemplateError;

/// Errors raised by [`super::JenkinsExecutor`].
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The build request failed validation.
    #[error("invalid build request: {0}")]
    Request(#[from] RequestError),
    /// The executor configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A call to the Jenkins server failed or was rejected by the breaker.
    #[error("remote call failed: {0}")]
    Remote(#[from] GatewayError),
    /// No build has run for the job yet.
    #[error("no build has been started yet for job {job}; try later")]
    NotStarted {
        /// Job that has no builds.
        job: JobName,
    },
    /// The stopped build did not report completion within the cleanup time
    /// limit. The job definition is left in place.
    #[error("job {job} did not report completion within {} s", .waited.as_secs())]
    CleanupTimeout {
        /// Job whose build was stopped.
        job: JobName,
        /// Time spent polling.
        waited: Duration,
    },
    /// The build scripts could not be generated.
    #[error(transparent)]
    Script(#[from] ScriptError),
    /// The job definition could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl ExecutorError {
    /// Reports whether the breaker rejected the call without contacting the
    /// server.
    #[must_use]
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::Remote(err) if err.is_circuit_open())
    }

    /// Reports whether repeating the call later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotStarted { .. }
                | Self::CleanupTimeout { .. }
                | Self::Remote(
                    GatewayError::CircuitOpen { .. }
                        | GatewayError::Timeout { .. }
                        | GatewayError::Remote {
                            source: RemoteClientError::Transport { .. },
                            ..
                        }
                )
        )
    }
}
