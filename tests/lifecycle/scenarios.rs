//! BDD scenarios for the Jenkins build lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Start a build for a new job"
)]
fn scenario_start_new_job(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Starting again reconfigures the existing job"
)]
fn scenario_restart_reconfigures(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Timeout annotation is capped at the ceiling"
)]
fn scenario_timeout_capped(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Stop a running build and delete its job"
)]
fn scenario_stop_and_delete(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Stop gives up when the build never completes"
)]
fn scenario_stop_times_out(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Stop a build that never ran"
)]
fn scenario_stop_not_started(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}
