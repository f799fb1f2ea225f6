//! Configuration loading via `ortho-config`.
//!
//! [`ExecutorConfig`] is the flat, layered view operators edit. The typed
//! policies the executor works with ([`Ecosystem`], [`ContainerDefaults`],
//! [`CleanupPolicy`], [`TimeoutPolicy`], [`BreakerPolicy`] and the
//! [`ScriptStrategy`]) are derived from it once, at construction.

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::gateway::BreakerPolicy;
use crate::script::{ContainerDefaults, ContainerVariant, ScriptStrategy};

/// Default label of the Jenkins nodes builds run on.
pub const DEFAULT_NODE_LABEL: &str = "screwdriver";

/// Default prefix of Jenkins job names.
pub const DEFAULT_JOB_PREFIX: &str = "SD-";

/// Executor settings derived from environment variables and configuration
/// files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "EXECUTOR")]
pub struct ExecutorConfig {
    /// Jenkins host name. Required.
    pub jenkins_host: String,
    /// Jenkins HTTP port.
    #[ortho_config(default = 8080)]
    pub jenkins_port: u16,
    /// Whether to talk to Jenkins over HTTPS.
    #[ortho_config(default = false)]
    pub jenkins_use_tls: bool,
    /// Jenkins user the executor authenticates as.
    #[ortho_config(default = "screwdriver".to_owned())]
    pub jenkins_username: String,
    /// Password or API token of the Jenkins user. Required.
    pub jenkins_password: String,
    /// Label of the Jenkins nodes builds are pinned to.
    #[ortho_config(default = DEFAULT_NODE_LABEL.to_owned())]
    pub jenkins_node_label: String,
    /// Whether to fetch a CSRF crumb before issuing POST requests.
    #[ortho_config(default = true)]
    pub jenkins_crumb_issuer: bool,
    /// Prefix prepended to the build id to form the job name.
    #[ortho_config(default = DEFAULT_JOB_PREFIX.to_owned())]
    pub job_name_prefix: String,
    /// Routable URI of the API builds report to. Required.
    pub ecosystem_api: String,
    /// Routable URI of the artifact store logs are shipped to. Required.
    pub ecosystem_store: String,
    /// Routable URI of the user interface, forwarded when set.
    pub ecosystem_ui: Option<String>,
    /// Path to the docker command on the build nodes.
    #[ortho_config(default = "docker".to_owned())]
    pub docker_command: String,
    /// Tag of the launcher image.
    #[ortho_config(default = "stable".to_owned())]
    pub docker_launch_version: String,
    /// Prefix of every container name.
    #[ortho_config(default = String::new())]
    pub docker_prefix: String,
    /// Memory limit of the build container (`--memory`).
    #[ortho_config(default = "4g".to_owned())]
    pub docker_memory: String,
    /// Memory plus swap limit of the build container (`--memory-swap`).
    #[ortho_config(default = "6g".to_owned())]
    pub docker_memory_limit: String,
    /// Whether to run builds through a compose manifest instead of plain
    /// `docker run` calls.
    #[ortho_config(default = false)]
    pub docker_use_compose: bool,
    /// Compose command, split on whitespace (for example `docker compose`).
    #[ortho_config(default = "docker-compose".to_owned())]
    pub docker_compose_command: String,
    /// Directory on the build node the compose manifest is written to.
    #[ortho_config(default = ".".to_owned())]
    pub docker_compose_manifest_dir: String,
    /// Operator supplied build script replacing the generated one.
    pub build_script: Option<String>,
    /// Operator supplied cleanup script used with `build_script`.
    pub cleanup_script: Option<String>,
    /// Seconds to wait for a stopped build before giving up.
    #[ortho_config(default = 20)]
    pub cleanup_time_limit_secs: u64,
    /// Seconds between status checks while waiting for a stopped build.
    #[ortho_config(default = 2)]
    pub cleanup_watch_interval_secs: u64,
    /// Build timeout in minutes when no annotation overrides it.
    #[ortho_config(default = 90)]
    pub build_timeout_minutes: u64,
    /// Upper bound in minutes for any annotation supplied timeout.
    #[ortho_config(default = 120)]
    pub max_build_timeout_minutes: u64,
    /// Consecutive failures that open the circuit breaker.
    #[ortho_config(default = 5)]
    pub breaker_max_failures: u32,
    /// Milliseconds the breaker stays open before a trial call.
    #[ortho_config(default = 50)]
    pub breaker_reset_timeout_ms: u64,
    /// Milliseconds any single remote call may take.
    #[ortho_config(default = 10_000)]
    pub breaker_call_timeout_ms: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

/// Routable endpoints forwarded to every build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ecosystem {
    /// API endpoint.
    pub api: String,
    /// Artifact store endpoint.
    pub store: String,
    /// User interface endpoint.
    pub ui: Option<String>,
}

/// Bounds on the stop poll loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CleanupPolicy {
    /// Delay between status checks.
    pub watch_interval: Duration,
    /// Total time allowed for the build to report completion.
    pub time_limit: Duration,
}

/// Default and maximum build timeouts, in minutes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeoutPolicy {
    /// Timeout used when no annotation overrides it.
    pub default_minutes: u64,
    /// Ceiling applied to annotation supplied timeouts.
    pub max_minutes: u64,
}

impl ExecutorConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to jenkins-executor.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("jenkins-executor")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply the offending value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when values contradict each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.jenkins_host,
            &FieldMetadata::new("Jenkins host", "EXECUTOR_JENKINS_HOST", "jenkins_host"),
        )?;
        Self::require_field(
            &self.jenkins_password,
            &FieldMetadata::new(
                "Jenkins password",
                "EXECUTOR_JENKINS_PASSWORD",
                "jenkins_password",
            ),
        )?;
        Self::require_field(
            &self.jenkins_node_label,
            &FieldMetadata::new(
                "Jenkins node label",
                "EXECUTOR_JENKINS_NODE_LABEL",
                "jenkins_node_label",
            ),
        )?;
        Self::require_field(
            &self.ecosystem_api,
            &FieldMetadata::new("API URI", "EXECUTOR_ECOSYSTEM_API", "ecosystem_api"),
        )?;
        Self::require_field(
            &self.ecosystem_store,
            &FieldMetadata::new("store URI", "EXECUTOR_ECOSYSTEM_STORE", "ecosystem_store"),
        )?;
        Self::require_field(
            &self.docker_command,
            &FieldMetadata::new("docker command", "EXECUTOR_DOCKER_COMMAND", "docker_command"),
        )?;
        if self.docker_use_compose {
            Self::require_field(
                &self.docker_compose_command,
                &FieldMetadata::new(
                    "compose command",
                    "EXECUTOR_DOCKER_COMPOSE_COMMAND",
                    "docker_compose_command",
                ),
            )?;
        }

        if self.cleanup_time_limit_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "cleanup_time_limit_secs must be greater than zero",
            )));
        }
        if self.cleanup_watch_interval_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "cleanup_watch_interval_secs must be greater than zero",
            )));
        }
        if self.breaker_max_failures == 0 {
            return Err(ConfigError::Invalid(String::from(
                "breaker_max_failures must be greater than zero",
            )));
        }
        if self.build_timeout_minutes > self.max_build_timeout_minutes {
            return Err(ConfigError::Invalid(format!(
                "build_timeout_minutes ({}) exceeds max_build_timeout_minutes ({})",
                self.build_timeout_minutes, self.max_build_timeout_minutes
            )));
        }
        Ok(())
    }

    /// Returns the base URL of the Jenkins server.
    #[must_use]
    pub fn jenkins_base_url(&self) -> String {
        let scheme = if self.jenkins_use_tls { "https" } else { "http" };
        format!(
            "{scheme}://{}:{}",
            self.jenkins_host.trim(),
            self.jenkins_port
        )
    }

    /// Returns the endpoints forwarded to builds.
    #[must_use]
    pub fn ecosystem(&self) -> Ecosystem {
        Ecosystem {
            api: self.ecosystem_api.trim().to_owned(),
            store: self.ecosystem_store.trim().to_owned(),
            ui: self
                .ecosystem_ui
                .as_deref()
                .map(str::trim)
                .filter(|ui| !ui.is_empty())
                .map(str::to_owned),
        }
    }

    /// Returns the stop poll bounds.
    #[must_use]
    pub const fn cleanup_policy(&self) -> CleanupPolicy {
        CleanupPolicy {
            watch_interval: Duration::from_secs(self.cleanup_watch_interval_secs),
            time_limit: Duration::from_secs(self.cleanup_time_limit_secs),
        }
    }

    /// Returns the build timeout bounds.
    #[must_use]
    pub const fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy {
            default_minutes: self.build_timeout_minutes,
            max_minutes: self.max_build_timeout_minutes,
        }
    }

    /// Returns the circuit breaker policy.
    #[must_use]
    pub const fn breaker_policy(&self) -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: self.breaker_max_failures,
            reset_timeout: Duration::from_millis(self.breaker_reset_timeout_ms),
            call_timeout: Duration::from_millis(self.breaker_call_timeout_ms),
        }
    }

    /// Selects how build scripts are produced: operator overrides when a
    /// build script is configured, generated container commands otherwise.
    #[must_use]
    pub fn script_strategy(&self) -> ScriptStrategy {
        if let Some(build) = self
            .build_script
            .as_deref()
            .filter(|script| !script.trim().is_empty())
        {
            return ScriptStrategy::Override {
                build: build.to_owned(),
                cleanup: self.cleanup_script.clone().unwrap_or_default(),
            };
        }

        let variant = if self.docker_use_compose {
            ContainerVariant::Composed
        } else {
            ContainerVariant::DirectContainer
        };
        ScriptStrategy::Synthesized {
            variant,
            defaults: ContainerDefaults {
                docker_command: self.docker_command.trim().to_owned(),
                launch_version: self.docker_launch_version.trim().to_owned(),
                prefix: self.docker_prefix.trim().to_owned(),
                memory: self.docker_memory.trim().to_owned(),
                memory_limit: self.docker_memory_limit.trim().to_owned(),
                compose_command: self
                    .docker_compose_command
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect(),
                manifest_dir: Utf8PathBuf::from(self.docker_compose_manifest_dir.trim()),
            },
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates values that are present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
pub(crate) fn sample_config() -> ExecutorConfig {
    ExecutorConfig {
        jenkins_host: String::from("jenkins"),
        jenkins_port: 8080,
        jenkins_use_tls: false,
        jenkins_username: String::from("admin"),
        jenkins_password: String::from("fakepassword"),
        jenkins_node_label: String::from(DEFAULT_NODE_LABEL),
        jenkins_crumb_issuer: false,
        job_name_prefix: String::from(DEFAULT_JOB_PREFIX),
        ecosystem_api: String::from("http://api.local"),
        ecosystem_store: String::from("http://store.local"),
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

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn sample_config_is_valid() {
        assert_eq!(sample_config().validate(), Ok(()));
    }

    #[rstest]
    #[case::host("jenkins_host", "EXECUTOR_JENKINS_HOST")]
    #[case::password("jenkins_password", "EXECUTOR_JENKINS_PASSWORD")]
    #[case::api("ecosystem_api", "EXECUTOR_ECOSYSTEM_API")]
    #[case::store("ecosystem_store", "EXECUTOR_ECOSYSTEM_STORE")]
    fn missing_fields_name_their_source(#[case] field: &str, #[case] env_var: &str) {
        let mut config = sample_config();
        match field {
            "jenkins_host" => config.jenkins_host = String::from("  "),
            "jenkins_password" => config.jenkins_password = String::new(),
            "ecosystem_api" => config.ecosystem_api = String::new(),
            _ => config.ecosystem_store = String::new(),
        }

        let err = config.validate().expect_err("blank field should fail");
        let ConfigError::MissingField(message) = err else {
            panic!("expected MissingField, got {err:?}");
        };
        assert!(message.contains(env_var), "message: {message}");
        assert!(message.contains(field), "message: {message}");
    }

    #[test]
    fn rejects_zero_cleanup_time_limit() {
        let mut config = sample_config();
        config.cleanup_time_limit_secs = 0;
        let err = config.validate().expect_err("zero limit should be rejected");
        assert_eq!(
            err,
            ConfigError::Invalid(String::from(
                "cleanup_time_limit_secs must be greater than zero"
            ))
        );
    }

    #[test]
    fn rejects_zero_watch_interval() {
        let mut config = sample_config();
        config.cleanup_watch_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_default_timeout_above_maximum() {
        let mut config = sample_config();
        config.build_timeout_minutes = 121;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn override_script_wins_when_configured() {
        let mut config = sample_config();
        config.build_script = Some(String::from("make build"));
        config.cleanup_script = None;

        assert_eq!(
            config.script_strategy(),
            ScriptStrategy::Override {
                build: String::from("make build"),
                cleanup: String::new(),
            }
        );
    }

    #[rstest]
    #[case::direct(false, ContainerVariant::DirectContainer)]
    #[case::compose(true, ContainerVariant::Composed)]
    fn selects_container_variant(#[case] use_compose: bool, #[case] expected: ContainerVariant) {
        let mut config = sample_config();
        config.docker_use_compose = use_compose;
        config.build_script = Some(String::from("   "));

        let ScriptStrategy::Synthesized { variant, defaults } = config.script_strategy() else {
            panic!("blank override should not be used");
        };
        assert_eq!(variant, expected);
        assert_eq!(defaults.compose_command, vec![String::from("docker-compose")]);
    }

    #[test]
    fn base_url_respects_tls_toggle() {
        let mut config = sample_config();
        assert_eq!(config.jenkins_base_url(), "http://jenkins:8080");
        config.jenkins_use_tls = true;
        config.jenkins_port = 8443;
        assert_eq!(config.jenkins_base_url(), "https://jenkins:8443");
    }

    #[test]
    fn blank_ui_is_not_forwarded() {
        let mut config = sample_config();
        config.ecosystem_ui = Some(String::from(" "));
        assert_eq!(config.ecosystem().ui, None);
    }
}
