//! Build lifecycle on a Jenkins server.
//!
//! A build id maps to exactly one job, so starting is create-or-update
//! followed by a trigger, and stopping is stop, wait, delete. All remote
//! calls go through one [`CommandGateway`].

mod error;
mod wait;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::annotations;
use crate::backend::{BuildId, BuildRequest, Executor, ExecutorFuture, LogStream};
use crate::clock::{Clock, TokioClock};
use crate::config::{CleanupPolicy, Ecosystem, ExecutorConfig, TimeoutPolicy};
use crate::gateway::{BreakerState, CommandGateway, JobInfo, JobName, RemoteClient};
use crate::jenkins::JenkinsClient;
use crate::script::{ScriptContext, ScriptStrategy};
use crate::template::{
    API_PARAMETER, BUILD_ID_PARAMETER, CONTAINER_PARAMETER, STORE_PARAMETER, TIMEOUT_PARAMETER,
    TOKEN_PARAMETER, UI_PARAMETER, render_job_definition,
};

pub use error::ExecutorError;

/// Executor that runs builds as Jenkins jobs.
pub struct JenkinsExecutor<C = JenkinsClient> {
    gateway: CommandGateway<C>,
    clock: Arc<dyn Clock>,
    strategy: ScriptStrategy,
    ecosystem: Ecosystem,
    node_label: String,
    job_prefix: String,
    cleanup: CleanupPolicy,
    timeouts: TimeoutPolicy,
}

impl<C> fmt::Debug for JenkinsExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JenkinsExecutor")
            .field("gateway", &self.gateway)
            .field("strategy", &self.strategy)
            .field("node_label", &self.node_label)
            .field("job_prefix", &self.job_prefix)
            .field("cleanup", &self.cleanup)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl JenkinsExecutor<JenkinsClient> {
    /// Builds an executor that talks HTTP to the configured server.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Config`] when the configuration is invalid.
    pub fn new(config: &ExecutorConfig) -> Result<Self, ExecutorError> {
        config.validate()?;
        let client = JenkinsClient::from_config(config)?;
        Self::with_client(config, client, Arc::new(TokioClock))
    }
}

impl<C: RemoteClient> JenkinsExecutor<C> {
    /// Builds an executor over an arbitrary client and clock.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Config`] when the configuration is invalid.
    pub fn with_client(
        config: &ExecutorConfig,
        client: C,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ExecutorError> {
        config.validate()?;
        Ok(Self {
            gateway: CommandGateway::new(client, config.breaker_policy(), Arc::clone(&clock)),
            clock,
            strategy: config.script_strategy(),
            ecosystem: config.ecosystem(),
            node_label: config.jenkins_node_label.trim().to_owned(),
            job_prefix: config.job_name_prefix.clone(),
            cleanup: config.cleanup_policy(),
            timeouts: config.timeout_policy(),
        })
    }

    /// Returns the job name used for `build_id`.
    #[must_use]
    pub fn job_name(&self, build_id: &BuildId) -> JobName {
        JobName::for_build(&self.job_prefix, build_id)
    }

    /// Returns the gateway every remote call goes through.
    #[must_use]
    pub const fn gateway(&self) -> &CommandGateway<C> {
        &self.gateway
    }

    /// Returns a snapshot of the circuit breaker state.
    #[must_use]
    pub fn breaker_state(&self) -> BreakerState {
        self.gateway.breaker_state()
    }

    /// Defines (or redefines) the job for `request` and triggers a build.
    ///
    /// Safe to repeat: an existing job is reconfigured in place rather than
    /// created again. Nothing is rolled back when a later step fails.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Request`] for an invalid request,
    /// [`ExecutorError::Script`] or [`ExecutorError::Template`] when the job
    /// definition cannot be produced, and [`ExecutorError::Remote`] when any
    /// remote call fails.
    pub async fn start(&self, request: &BuildRequest) -> Result<(), ExecutorError> {
        request.validate()?;
        let job = self.job_name(&request.build_id);
        let resolved = annotations::resolve(
            self.timeouts.default_minutes,
            self.timeouts.max_minutes,
            &request.annotations,
        );
        let scripts = self.strategy.generate(&ScriptContext {
            build_id: &request.build_id,
            container: &request.container,
            ecosystem: &self.ecosystem,
        })?;
        let node_label = resolved.node_label(&self.node_label);
        let definition = render_job_definition(&node_label, &scripts.build, &scripts.cleanup)?;

        if self.gateway.job_exists(&job).await? {
            info!(%job, node_label = %node_label, "updating job definition");
            self.gateway.update_job(&job, &definition).await?;
        } else {
            info!(%job, node_label = %node_label, "creating job definition");
            self.gateway.create_job(&job, &definition).await?;
        }

        let parameters = self.build_parameters(request, resolved.timeout_minutes);
        self.gateway.trigger_build(&job, parameters).await?;
        info!(
            %job,
            timeout_minutes = resolved.timeout_minutes,
            "triggered build"
        );
        Ok(())
    }

    /// Stops the most recent build of `build_id`, waits for Jenkins to report
    /// it complete, then deletes the job.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::NotStarted`] when no build has run yet,
    /// [`ExecutorError::CleanupTimeout`] when completion is not reported
    /// within the cleanup time limit (the job is then left defined), and
    /// [`ExecutorError::Remote`] when any remote call fails.
    pub async fn stop(&self, build_id: &BuildId) -> Result<(), ExecutorError> {
        let job = self.job_name(build_id);
        let number = self.last_build_number(&job).await?;

        info!(%job, number, "stopping build");
        self.gateway.stop_build(&job, number).await?;
        self.wait_for_completion(&job, number).await?;

        self.gateway.destroy_job(&job).await?;
        info!(%job, "deleted job");
        Ok(())
    }

    /// Opens the log of the most recent build of `build_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::NotStarted`] when no build has run yet and
    /// [`ExecutorError::Remote`] when a remote call fails.
    pub async fn stream(&self, build_id: &BuildId) -> Result<LogStream, ExecutorError> {
        let job = self.job_name(build_id);
        let number = self.last_build_number(&job).await?;
        Ok(self.gateway.build_log(&job, number).await?)
    }

    async fn last_build_number(&self, job: &JobName) -> Result<u64, ExecutorError> {
        let info: JobInfo = self.gateway.job_info(job).await?;
        info.last_build_number()
            .ok_or_else(|| ExecutorError::NotStarted { job: job.clone() })
    }

    fn build_parameters(
        &self,
        request: &BuildRequest,
        timeout_minutes: u64,
    ) -> BTreeMap<String, String> {
        let mut parameters = BTreeMap::from([
            (
                BUILD_ID_PARAMETER.to_owned(),
                request.build_id.as_str().to_owned(),
            ),
            (TOKEN_PARAMETER.to_owned(), request.token.clone()),
            (CONTAINER_PARAMETER.to_owned(), request.container.clone()),
            (API_PARAMETER.to_owned(), self.ecosystem.api.clone()),
            (STORE_PARAMETER.to_owned(), self.ecosystem.store.clone()),
            (TIMEOUT_PARAMETER.to_owned(), timeout_minutes.to_string()),
        ]);
        if let Some(ui) = &self.ecosystem.ui {
            parameters.insert(UI_PARAMETER.to_owned(), ui.clone());
        }
        parameters
    }
}

impl<C: RemoteClient> Executor for JenkinsExecutor<C> {
    type Error = ExecutorError;

    fn start<'a>(&'a self, request: &'a BuildRequest) -> ExecutorFuture<'a, (), Self::Error> {
        Box::pin(Self::start(self, request))
    }

    fn stop<'a>(&'a self, build_id: &'a BuildId) -> ExecutorFuture<'a, (), Self::Error> {
        Box::pin(Self::stop(self, build_id))
    }

    fn stream<'a>(
        &'a self,
        build_id: &'a BuildId,
    ) -> ExecutorFuture<'a, LogStream, Self::Error> {
        Box::pin(Self::stream(self, build_id))
    }
}
