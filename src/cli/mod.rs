//! Command-line interface definitions for the `jenkins-executor` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser};

/// Top-level CLI for the `jenkins-executor` binary.
#[derive(Debug, Parser)]
#[command(
    name = "jenkins-executor",
    about = "Run, stop, and follow builds as Jenkins jobs",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Define the job for a build and trigger it.
    #[command(name = "start", about = "Define the job for a build and trigger it")]
    Start(StartCommand),
    /// Stop the latest build of a job and delete the job.
    #[command(name = "stop", about = "Stop the latest build of a job and delete the job")]
    Stop(BuildTarget),
    /// Copy the console log of the latest build to stdout.
    #[command(name = "stream", about = "Copy the console log of the latest build to stdout")]
    Stream(BuildTarget),
}

/// Arguments for the `jenkins-executor start` subcommand.
#[derive(Debug, Args)]
pub(crate) struct StartCommand {
    /// Identifier of the build; the job is named after it.
    #[arg(long, value_name = "ID")]
    pub(crate) build_id: String,
    /// Container image the build runs in.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) container: String,
    /// Token the build uses against the API.
    #[arg(long, value_name = "TOKEN", env = "SD_TOKEN", hide_env_values = true)]
    pub(crate) token: String,
    /// Build annotation such as `screwdriver.cd/timeout=45`. Repeatable.
    ///
    /// Values that parse as JSON (numbers, booleans) are passed as such;
    /// anything else is passed as a string.
    #[arg(long = "annotation", value_name = "KEY=VALUE", value_parser = parse_annotation)]
    pub(crate) annotations: Vec<(String, String)>,
}

/// Build selector shared by `stop` and `stream`.
#[derive(Debug, Args)]
pub(crate) struct BuildTarget {
    /// Identifier of the build.
    #[arg(long, value_name = "ID")]
    pub(crate) build_id: String,
}

/// Splits `KEY=VALUE` at the first `=`.
pub(crate) fn parse_annotation(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(String::from("annotation key must not be empty"));
    }
    Ok((trimmed.to_owned(), value.to_owned()))
}
