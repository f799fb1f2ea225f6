//! Binary entry point for the `jenkins-executor` CLI.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::process;

use clap::Parser;
use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use jenkins_executor::{
    BuildId, BuildRequest, ConfigError, ExecutorConfig, ExecutorError, JenkinsExecutor,
    RemoteClientError, RequestError,
};

mod cli;

use cli::{BuildTarget, Cli, StartCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid build request: {0}")]
    Request(#[from] RequestError),
    #[error("{0}")]
    Executor(#[from] ExecutorError),
    #[error("log stream failed: {0}")]
    Log(#[from] RemoteClientError),
    #[error("failed to write log: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = ExecutorConfig::load_without_cli_args()?;
    let executor = JenkinsExecutor::new(&config)?;
    match cli {
        Cli::Start(command) => {
            let request = build_request(command)?;
            executor.start(&request).await?;
        }
        Cli::Stop(target) => {
            executor.stop(&build_id(&target)?).await?;
        }
        Cli::Stream(target) => {
            let mut log = executor.stream(&build_id(&target)?).await?;
            let mut stdout = tokio::io::stdout();
            while let Some(chunk) = log.next().await {
                stdout.write_all(&chunk?).await?;
            }
            stdout.flush().await?;
        }
    }
    Ok(())
}

fn build_request(command: StartCommand) -> Result<BuildRequest, RequestError> {
    let annotations: BTreeMap<String, Value> = command
        .annotations
        .into_iter()
        .map(|(key, value)| (key, annotation_value(&value)))
        .collect();
    BuildRequest::builder()
        .build_id(command.build_id)
        .container(command.container)
        .token(command.token)
        .annotations(annotations)
        .build()
}

/// Trims the id the same way the request builder does for `start`.
fn build_id(target: &BuildTarget) -> Result<BuildId, RequestError> {
    let id = BuildId::new(target.build_id.trim());
    id.validate()?;
    Ok(id)
}

/// Keeps JSON scalars typed and passes everything else through as a string.
fn annotation_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::String(_))) => value,
        _ => Value::String(raw.to_owned()),
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
