//! Shell scripts run by the remote job.
//!
//! A [`ScriptStrategy`] is chosen once from configuration. Operator supplied
//! scripts are returned verbatim; otherwise the scripts are synthesized from
//! [`ContainerDefaults`] in either the direct `docker run` form or the
//! compose form. Every build-controlled value is shell escaped, and the build
//! token never appears in a script: the container reads it from the
//! `SD_TOKEN` environment variable Jenkins sets from the build parameter.

mod compose;
mod docker;

use camino::Utf8PathBuf;
use shell_escape::unix::escape;
use thiserror::Error;

use crate::backend::BuildId;
use crate::config::Ecosystem;

/// Repository of the launcher support image.
pub const LAUNCHER_REPOSITORY: &str = "screwdrivercd/launcher";

/// Label key tagging every container that belongs to a build.
pub const BUILD_LABEL: &str = "sdbuild";

/// Build and cleanup scripts for one job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskScripts {
    /// Script run by the job build step.
    pub build: String,
    /// Script run by the post-build cleanup step.
    pub cleanup: String,
}

/// How the container commands are issued on the build node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContainerVariant {
    /// Plain `docker pull` / `docker run` calls.
    DirectContainer,
    /// A compose manifest brought up with the compose command.
    Composed,
}

/// Operator defaults used when scripts are synthesized.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerDefaults {
    /// Docker command on the build node.
    pub docker_command: String,
    /// Tag of the launcher image.
    pub launch_version: String,
    /// Prefix of container names and the build label.
    pub prefix: String,
    /// Memory limit of the build container.
    pub memory: String,
    /// Memory plus swap limit of the build container.
    pub memory_limit: String,
    /// Compose command split into words.
    pub compose_command: Vec<String>,
    /// Directory the compose manifest is written to.
    pub manifest_dir: Utf8PathBuf,
}

impl ContainerDefaults {
    fn launcher_image(&self) -> String {
        format!("{LAUNCHER_REPOSITORY}:{}", self.launch_version)
    }
}

/// Source of the scripts a job runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScriptStrategy {
    /// Operator supplied scripts, used verbatim.
    Override {
        /// Build script.
        build: String,
        /// Cleanup script; empty when none was configured.
        cleanup: String,
    },
    /// Scripts synthesized from container defaults.
    Synthesized {
        /// Command style used on the build node.
        variant: ContainerVariant,
        /// Container defaults.
        defaults: ContainerDefaults,
    },
}

/// Per-build values the scripts are generated from.
#[derive(Clone, Copy, Debug)]
pub struct ScriptContext<'a> {
    /// Build being run.
    pub build_id: &'a BuildId,
    /// Build container image.
    pub container: &'a str,
    /// Endpoints the launcher and log service talk to.
    pub ecosystem: &'a Ecosystem,
}

/// Errors raised while generating scripts.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The compose manifest template failed to render.
    #[error("failed to render compose manifest: {0}")]
    Manifest(#[from] askama::Error),
}

impl ScriptStrategy {
    /// Produces the build and cleanup scripts for one build.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Manifest`] when the compose manifest cannot be
    /// rendered.
    pub fn generate(&self, context: &ScriptContext<'_>) -> Result<TaskScripts, ScriptError> {
        match self {
            Self::Override { build, cleanup } => Ok(TaskScripts {
                build: build.clone(),
                cleanup: cleanup.clone(),
            }),
            Self::Synthesized {
                variant: ContainerVariant::DirectContainer,
                defaults,
            } => Ok(docker::scripts(defaults, context)),
            Self::Synthesized {
                variant: ContainerVariant::Composed,
                defaults,
            } => compose::scripts(defaults, context),
        }
    }
}

/// Container names derived from the build.
#[derive(Clone, Debug, Eq, PartialEq)]
struct ContainerNames {
    tag: String,
    launcher: String,
    build: String,
}

impl ContainerNames {
    fn new(prefix: &str, build_id: &BuildId) -> Self {
        let tag = format!("{prefix}{build_id}");
        Self {
            launcher: format!("{tag}-init"),
            build: format!("{tag}-build"),
            tag,
        }
    }

    fn label(&self) -> String {
        format!("{BUILD_LABEL}={}", self.tag)
    }
}

/// Command run inside the build container: the launcher and the log service
/// in the background, then a wait for both.
fn launch_command(build_id: &BuildId, ecosystem: &Ecosystem) -> String {
    let launch = shell_line([
        "/opt/sd/launch",
        "--api-uri",
        ecosystem.api.as_str(),
        "--emitter",
        "/opt/sd/emitter",
        build_id.as_str(),
    ]);
    let logservice = shell_line([
        "/opt/sd/logservice",
        "--emitter",
        "/opt/sd/emitter",
        "--api-uri",
        ecosystem.store.as_str(),
        "--build",
        build_id.as_str(),
    ]);
    format!("{launch} & {logservice} & wait $(jobs -p)")
}

/// Joins `words` into one shell command line, escaping each word.
fn shell_line<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|word| escape(word.as_ref().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
