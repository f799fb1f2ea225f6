//! Executor configuration shared by integration tests.

use jenkins_executor::ExecutorConfig;
use jenkins_executor::config::{DEFAULT_JOB_PREFIX, DEFAULT_NODE_LABEL};

/// Returns a valid configuration pointing at a fictitious server.
pub fn executor_config() -> ExecutorConfig {
    ExecutorConfig {
        jenkins_host: String::from("jenkins.test"),
        jenkins_port: 8080,
        jenkins_use_tls: false,
        jenkins_username: String::from("admin"),
        jenkins_password: String::from("fakepassword"),
        jenkins_node_label: String::from(DEFAULT_NODE_LABEL),
        jenkins_crumb_issuer: false,
        job_name_prefix: String::from(DEFAULT_JOB_PREFIX),
        ecosystem_api: String::from("https://api.test"),
        ecosystem_store: String::from("https://store.test"),
        ecosystem_ui: None,
        docker_command: String::from("docker"),
        docker_launch_version: String::from("stable"),
        docker_prefix: String::new(),
        docker_memory: String::from("4g"),
        docker_memory_limit: String::from("6g"),
        docker_use_compose: false,
        docker_compose_command: String::from("docker-compose"),
        docker_compose_manifest_dir: String::from("."),
        build_script: None,
        cleanup_script: None,
        cleanup_time_limit_secs: 20,
        cleanup_watch_interval_secs: 2,
        build_timeout_minutes: 90,
        max_build_timeout_minutes: 120,
        breaker_max_failures: 5,
        breaker_reset_timeout_ms: 50,
        breaker_call_timeout_ms: 10_000,
    }
}
