//! Shared fixtures for lifecycle BDD scenarios.

use std::sync::{Arc, Mutex, PoisonError};

use jenkins_executor::test_support::{ManualClock, ScriptedClient};
use jenkins_executor::{ExecutorError, JenkinsExecutor};
use rstest::fixture;

use crate::executor_config::executor_config;

/// Result of the last lifecycle call, reduced to what scenarios assert on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Success,
    NotStarted,
    CleanupTimeout,
    Failure(String),
}

impl From<Result<(), ExecutorError>> for Outcome {
    fn from(result: Result<(), ExecutorError>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(ExecutorError::NotStarted { .. }) => Self::NotStarted,
            Err(ExecutorError::CleanupTimeout { .. }) => Self::CleanupTimeout,
            Err(err) => Self::Failure(err.to_string()),
        }
    }
}

/// Scenario state. Every field shares its storage between clones.
#[derive(Clone, Debug, Default)]
pub struct LifecycleContext {
    pub client: ScriptedClient,
    pub clock: ManualClock,
    outcome: Arc<Mutex<Option<Outcome>>>,
}

impl LifecycleContext {
    pub fn executor(&self) -> JenkinsExecutor<ScriptedClient> {
        JenkinsExecutor::with_client(
            &executor_config(),
            self.client.clone(),
            Arc::new(self.clock.clone()),
        )
        .unwrap_or_else(|err| panic!("executor should build: {err}"))
    }

    pub fn record(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    LifecycleContext::default()
}
