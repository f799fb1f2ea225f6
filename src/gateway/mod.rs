//! Single entry point for every call to the remote build server.
//!
//! Each supported operation is one [`RemoteCommand`] variant, so an invalid
//! module/action pair cannot be expressed. [`CommandGateway::run`] admits the
//! command through the circuit breaker, bounds it with the call timeout, and
//! records the outcome. The typed helpers check the reply shape on top.

mod breaker;
mod error;
mod types;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::backend::LogStream;
use crate::clock::Clock;
use breaker::Breaker;

pub use breaker::{BreakerPolicy, BreakerState};
pub use error::{GatewayError, RemoteClientError};
pub use types::{BuildRef, JobInfo, JobName};

/// One operation against the remote server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RemoteCommand {
    /// Checks whether a job definition exists.
    JobExists {
        /// Job to look up.
        name: JobName,
    },
    /// Creates a job definition.
    JobCreate {
        /// Job to create.
        name: JobName,
        /// Rendered job definition.
        definition: String,
    },
    /// Replaces the definition of an existing job.
    JobConfig {
        /// Job to reconfigure.
        name: JobName,
        /// Rendered job definition.
        definition: String,
    },
    /// Triggers a build of a job with named parameters.
    JobBuild {
        /// Job to build.
        name: JobName,
        /// Build parameters.
        parameters: BTreeMap<String, String>,
    },
    /// Fetches the job status document.
    JobGet {
        /// Job to inspect.
        name: JobName,
    },
    /// Deletes a job definition.
    JobDestroy {
        /// Job to delete.
        name: JobName,
    },
    /// Aborts a running build.
    BuildStop {
        /// Job owning the build.
        name: JobName,
        /// Build number to abort.
        number: u64,
    },
    /// Opens the log of a build.
    BuildLog {
        /// Job owning the build.
        name: JobName,
        /// Build number whose log is read.
        number: u64,
    },
}

impl RemoteCommand {
    /// Returns the `module.action` label of the command.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::JobExists { .. } => "job.exists",
            Self::JobCreate { .. } => "job.create",
            Self::JobConfig { .. } => "job.config",
            Self::JobBuild { .. } => "job.build",
            Self::JobGet { .. } => "job.get",
            Self::JobDestroy { .. } => "job.destroy",
            Self::BuildStop { .. } => "build.stop",
            Self::BuildLog { .. } => "build.log",
        }
    }

    /// Returns the job the command targets.
    #[must_use]
    pub const fn job_name(&self) -> &JobName {
        match self {
            Self::JobExists { name }
            | Self::JobCreate { name, .. }
            | Self::JobConfig { name, .. }
            | Self::JobBuild { name, .. }
            | Self::JobGet { name }
            | Self::JobDestroy { name }
            | Self::BuildStop { name, .. }
            | Self::BuildLog { name, .. } => name,
        }
    }
}

/// Reply to a [`RemoteCommand`].
pub enum RemoteReply {
    /// Answer to [`RemoteCommand::JobExists`].
    Exists(bool),
    /// Answer to [`RemoteCommand::JobGet`].
    Job(JobInfo),
    /// Acknowledgement of a command without a payload.
    Ack,
    /// Answer to [`RemoteCommand::BuildLog`].
    Log(LogStream),
}

impl RemoteReply {
    /// Short name of the reply variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Exists(_) => "exists",
            Self::Job(_) => "job",
            Self::Ack => "ack",
            Self::Log(_) => "log",
        }
    }
}

impl fmt::Debug for RemoteReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists(exists) => f.debug_tuple("Exists").field(exists).finish(),
            Self::Job(info) => f.debug_tuple("Job").field(info).finish(),
            Self::Ack => f.write_str("Ack"),
            Self::Log(_) => f.write_str("Log(..)"),
        }
    }
}

/// Future returned by [`RemoteClient::execute`].
pub type RemoteFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, RemoteClientError>> + Send + 'a>>;

/// Transport that carries out remote commands.
pub trait RemoteClient: Send + Sync {
    /// Executes `command` against the remote server.
    fn execute<'a>(&'a self, command: &'a RemoteCommand) -> RemoteFuture<'a, RemoteReply>;
}

/// Routes every remote call through one breaker and one call timeout.
pub struct CommandGateway<C> {
    client: C,
    breaker: Breaker,
    call_timeout: Duration,
}

impl<C> fmt::Debug for CommandGateway<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandGateway")
            .field("breaker", &self.breaker.state())
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl<C: RemoteClient> CommandGateway<C> {
    /// Wraps `client` with a breaker configured by `policy`.
    #[must_use]
    pub fn new(client: C, policy: BreakerPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            breaker: Breaker::new(policy, clock),
            call_timeout: policy.call_timeout,
        }
    }

    /// Returns the wrapped client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Returns a snapshot of the breaker state.
    #[must_use]
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Issues `command` through the breaker.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::CircuitOpen`] without contacting the server
    /// while the breaker rejects calls, [`GatewayError::Timeout`] when the call
    /// exceeds the call timeout, and [`GatewayError::Remote`] when the client
    /// reports a failure.
    pub async fn run(&self, command: RemoteCommand) -> Result<RemoteReply, GatewayError> {
        let operation = command.operation();
        let permit = self
            .breaker
            .admit()
            .map_err(|retry_after| GatewayError::CircuitOpen { retry_after })?;

        debug!(operation, job = %command.job_name(), "issuing remote command");
        match timeout(self.call_timeout, self.client.execute(&command)).await {
            Ok(Ok(reply)) => {
                permit.succeed();
                Ok(reply)
            }
            Ok(Err(source)) => {
                permit.fail();
                Err(GatewayError::Remote { operation, source })
            }
            Err(_elapsed) => {
                permit.fail();
                Err(GatewayError::Timeout {
                    operation,
                    after: self.call_timeout,
                })
            }
        }
    }

    /// Reports whether the job exists.
    ///
    /// # Errors
    ///
    /// Propagates [`GatewayError`] from [`Self::run`].
    pub async fn job_exists(&self, name: &JobName) -> Result<bool, GatewayError> {
        let command = RemoteCommand::JobExists { name: name.clone() };
        match self.run(command).await? {
            RemoteReply::Exists(exists) => Ok(exists),
            other => Err(unexpected("job.exists", &other)),
        }
    }

    /// Creates the job with `definition`.
    ///
    /// # Errors
    ///
    /// Propagates [`GatewayError`] from [`Self::run`].
    pub async fn create_job(&self, name: &JobName, definition: &str) -> Result<(), GatewayError> {
        let command = RemoteCommand::JobCreate {
            name: name.clone(),
            definition: definition.to_owned(),
        };
        expect_ack("job.create", self.run(command).await?)
    }

    /// Replaces the definition of an existing job.
    ///
    /// # Errors
    ///
    /// Propagates [`GatewayError`] from [`Self::run`].
    pub async fn update_job(&self, name: &JobName, definition: &str) -> Result<(), GatewayError> {
        let command = RemoteCommand::JobConfig {
            name: name.clone(),
            definition: definition.to_owned(),
        };
        expect_ack("job.config", self.run(command).await?)
    }

    /// Triggers a build with `parameters`.
    ///
    /// # Errors
    ///
    /// Propagates [`GatewayError`] from [`Self::run`].
    pub async fn trigger_build(
        &self,
        name: &JobName,
        parameters: BTreeMap<String, String>,
    ) -> Result<(), GatewayError> {
        let command = RemoteCommand::JobBuild {
            name: name.clone(),
            parameters,
        };
        expect_ack("job.build", self.run(command).await?)
    }

    /// Fetches the job status document.
    ///
    /// # Errors
    ///
    /// Propagates [`GatewayError`] from [`Self::run`].
    pub async fn job_info(&self, name: &JobName) -> Result<JobInfo, GatewayError> {
        let command = RemoteCommand::JobGet { name: name.clone() };
        match self.run(command).await? {
            RemoteReply::Job(info) => Ok(info),
            other => Err(unexpected("job.get", &other)),
        }
    }

    /// Aborts build `number` of the job.
    ///
    /// # Errors
    ///
    /// Propagates [`GatewayError`] from [`Self::run`].
    pub async fn stop_build(&self, name: &JobName, number: u64) -> Result<(), GatewayError> {
        let command = RemoteCommand::BuildStop {
            name: name.clone(),
            number,
        };
        expect_ack("build.stop", self.run(command).await?)
    }

    /// Opens the log of build `number`.
    ///
    /// # Errors
    ///
    /// Propagates [`GatewayError`] from [`Self::run`].
    pub async fn build_log(&self, name: &JobName, number: u64) -> Result<LogStream, GatewayError> {
        let command = RemoteCommand::BuildLog {
            name: name.clone(),
            number,
        };
        match self.run(command).await? {
            RemoteReply::Log(stream) => Ok(stream),
            other => Err(unexpected("build.log", &other)),
        }
    }

    /// Deletes the job definition.
    ///
    /// # Errors
    ///
    /// Propagates [`GatewayError`] from [`Self::run`].
    pub async fn destroy_job(&self, name: &JobName) -> Result<(), GatewayError> {
        let command = RemoteCommand::JobDestroy { name: name.clone() };
        expect_ack("job.destroy", self.run(command).await?)
    }
}

fn expect_ack(operation: &'static str, reply: RemoteReply) -> Result<(), GatewayError> {
    match reply {
        RemoteReply::Ack => Ok(()),
        other => Err(unexpected(operation, &other)),
    }
}

const fn unexpected(operation: &'static str, reply: &RemoteReply) -> GatewayError {
    GatewayError::UnexpectedReply {
        operation,
        reply: reply.kind(),
    }
}
