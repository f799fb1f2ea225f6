//! Core library for the Jenkins build executor.
//!
//! The crate exposes the [`Executor`] abstraction used by the pipeline
//! orchestrator and a Jenkins implementation that provisions one job per
//! build, triggers it, stops it (waiting for completion before deleting the
//! job), and relays its console log.

pub mod annotations;
pub mod backend;
pub mod clock;
pub mod config;
pub mod gateway;
pub mod jenkins;
pub mod lifecycle;
pub mod script;
pub mod template;
pub mod test_support;

pub use backend::{
    BuildId, BuildRequest, BuildRequestBuilder, Executor, ExecutorFuture, LogStream,
    PeriodicRequest, RequestError,
};
pub use clock::{Clock, TokioClock};
pub use config::{CleanupPolicy, ConfigError, Ecosystem, ExecutorConfig, TimeoutPolicy};
pub use gateway::{
    BreakerPolicy, BreakerState, CommandGateway, GatewayError, JobInfo, JobName, RemoteClient,
    RemoteClientError, RemoteCommand, RemoteReply,
};
pub use jenkins::JenkinsClient;
pub use lifecycle::{ExecutorError, JenkinsExecutor};
pub use script::{ScriptError, ScriptStrategy, TaskScripts};
pub use template::TemplateError;
