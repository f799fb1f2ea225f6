//! BDD step definitions for the Jenkins build lifecycle.

use jenkins_executor::annotations::TIMEOUT_ANNOTATION;
use jenkins_executor::{BuildId, BuildRequest, JobName, RemoteCommand};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{LifecycleContext, Outcome};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn job_for(build_id: &str) -> JobName {
    JobName::for_build("SD-", &BuildId::from(build_id.trim()))
}

fn runtime() -> Runtime {
    Runtime::new().unwrap_or_else(|err| panic!("tokio runtime should start: {err}"))
}

fn start(lifecycle_context: &LifecycleContext, request: &BuildRequest) {
    let executor = lifecycle_context.executor();
    let result = runtime().block_on(executor.start(request));
    lifecycle_context.record(Outcome::from(result));
}

fn expect_outcome(
    lifecycle_context: &LifecycleContext,
    expected: &Outcome,
) -> Result<(), StepError> {
    match lifecycle_context.outcome() {
        Some(ref outcome) if outcome == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {expected:?}, got {other:?}"
        ))),
    }
}

#[given("a Jenkins server without a job for build \"{build_id}\"")]
fn server_without_job(lifecycle_context: &LifecycleContext, build_id: String) {
    assert!(!lifecycle_context.client.has_job(&job_for(&build_id)));
}

#[given("build \"{build_id}\" is running as build number {number}")]
fn build_running(lifecycle_context: &LifecycleContext, build_id: String, number: u64) {
    lifecycle_context.client.seed_job(job_for(&build_id));
    lifecycle_context
        .client
        .push_job_info(Some(number), number.checked_sub(1));
}

#[given("Jenkins reports build {number} complete after {checks} checks")]
fn completes_after(lifecycle_context: &LifecycleContext, number: u64, checks: u32) {
    for _ in 1..checks {
        lifecycle_context
            .client
            .push_job_info(Some(number), number.checked_sub(1));
    }
    lifecycle_context
        .client
        .push_job_info(Some(number), Some(number));
}

#[given("a Jenkins job for build \"{build_id}\" without builds")]
fn job_without_builds(lifecycle_context: &LifecycleContext, build_id: String) {
    lifecycle_context.client.seed_job(job_for(&build_id));
    lifecycle_context.client.push_job_info(None, None);
}

#[when("I start build \"{build_id}\" in container \"{container}\"")]
fn start_build(lifecycle_context: &LifecycleContext, build_id: String, container: String) {
    let request = BuildRequest::builder()
        .build_id(build_id)
        .container(container)
        .token("bdd-token")
        .build()
        .unwrap_or_else(|err| panic!("request should be valid: {err}"));
    start(lifecycle_context, &request);
}

#[when("I start build \"{build_id}\" with timeout annotation \"{minutes}\"")]
fn start_with_timeout(lifecycle_context: &LifecycleContext, build_id: String, minutes: String) {
    let request = BuildRequest::builder()
        .build_id(build_id)
        .container("node:20")
        .token("bdd-token")
        .annotation(TIMEOUT_ANNOTATION, minutes)
        .build()
        .unwrap_or_else(|err| panic!("request should be valid: {err}"));
    start(lifecycle_context, &request);
}

#[when("I stop build \"{build_id}\"")]
fn stop_build(lifecycle_context: &LifecycleContext, build_id: String) {
    let executor = lifecycle_context.executor();
    let target = BuildId::from(build_id.trim());
    let result = runtime().block_on(executor.stop(&target));
    lifecycle_context.record(Outcome::from(result));
}

#[then("the executor reports success")]
fn reports_success(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    expect_outcome(lifecycle_context, &Outcome::Success)
}

#[then("the executor reports a cleanup timeout")]
fn reports_cleanup_timeout(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    expect_outcome(lifecycle_context, &Outcome::CleanupTimeout)
}

#[then("the executor reports that no build has started")]
fn reports_not_started(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    expect_outcome(lifecycle_context, &Outcome::NotStarted)
}

#[then("the job \"{job}\" is created {created} time and updated {updated} times")]
fn definition_counts(
    lifecycle_context: &LifecycleContext,
    job: String,
    created: usize,
    updated: usize,
) -> Result<(), StepError> {
    let commands = lifecycle_context.client.commands();
    let for_job = |command: &&RemoteCommand| command.job_name().as_str() == job.trim();
    let creates = commands
        .iter()
        .filter(for_job)
        .filter(|command| matches!(command, RemoteCommand::JobCreate { .. }))
        .count();
    let updates = commands
        .iter()
        .filter(for_job)
        .filter(|command| matches!(command, RemoteCommand::JobConfig { .. }))
        .count();
    if (creates, updates) == (created, updated) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {created} creates and {updated} updates, got {creates} and {updates}"
        )))
    }
}

#[then("a build of \"{job}\" is triggered with timeout \"{minutes}\"")]
fn triggered_with_timeout(
    lifecycle_context: &LifecycleContext,
    job: String,
    minutes: String,
) -> Result<(), StepError> {
    let timeout = lifecycle_context
        .client
        .commands()
        .into_iter()
        .rev()
        .find_map(|command| match command {
            RemoteCommand::JobBuild { name, parameters } if name.as_str() == job.trim() => {
                parameters.get("SD_BUILD_TIMEOUT").cloned()
            }
            _ => None,
        })
        .ok_or_else(|| StepError::Assertion(format!("no build of {job} was triggered")))?;
    if timeout == minutes.trim() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected timeout {minutes}, got {timeout}"
        )))
    }
}

#[then("the job \"{job}\" no longer exists")]
fn job_deleted(lifecycle_context: &LifecycleContext, job: String) -> Result<(), StepError> {
    let name = job_for(job.trim().trim_start_matches("SD-"));
    if lifecycle_context.client.has_job(&name) {
        Err(StepError::Assertion(format!("{job} should have been deleted")))
    } else {
        Ok(())
    }
}

#[then("the job \"{job}\" still exists")]
fn job_kept(lifecycle_context: &LifecycleContext, job: String) -> Result<(), StepError> {
    let name = job_for(job.trim().trim_start_matches("SD-"));
    if lifecycle_context.client.has_job(&name) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("{job} should still be defined")))
    }
}

#[then("the executor slept {count} times")]
fn slept(lifecycle_context: &LifecycleContext, count: usize) -> Result<(), StepError> {
    let sleeps = lifecycle_context.clock.sleeps();
    if sleeps.len() == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} sleeps, got {sleeps:?}"
        )))
    }
}
