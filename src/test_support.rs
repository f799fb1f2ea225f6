//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::stream;

use crate::clock::{Clock, SleepFuture};
use crate::gateway::{
    JobInfo, JobName, RemoteClient, RemoteClientError, RemoteCommand, RemoteFuture, RemoteReply,
};

/// Reply queued on a [`ScriptedClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScriptedReply {
    /// Answers `job.exists`.
    Exists(bool),
    /// Answers `job.get`.
    Job(JobInfo),
    /// Acknowledges a command.
    Ack,
    /// Answers `build.log` with these chunks.
    Log(Vec<Bytes>),
    /// Fails the command.
    Fail(RemoteClientError),
    /// Never completes, so the gateway call timeout fires.
    Hang,
}

/// Remote client double that records commands and replays queued replies.
///
/// Replies are queued per operation (`job.get`, `build.stop`, ...). When a
/// queue is empty the client falls back to an in-memory model of the server:
/// created jobs exist until destroyed, `job.get` returns an empty status, and
/// every other command is acknowledged.
#[derive(Clone, Debug, Default)]
pub struct ScriptedClient {
    state: Arc<Mutex<ClientState>>,
}

#[derive(Debug, Default)]
struct ClientState {
    queued: HashMap<&'static str, VecDeque<ScriptedReply>>,
    jobs: BTreeSet<JobName>,
    commands: Vec<RemoteCommand>,
}

impl ScriptedClient {
    /// Creates a client with no queued replies and no jobs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `reply` for the next command with label `operation`.
    pub fn push(&self, operation: &'static str, reply: ScriptedReply) {
        self.lock()
            .queued
            .entry(operation)
            .or_default()
            .push_back(reply);
    }

    /// Queues a `job.get` reply reporting the given build numbers.
    pub fn push_job_info(&self, last_build: Option<u64>, last_completed: Option<u64>) {
        self.push(
            "job.get",
            ScriptedReply::Job(JobInfo {
                last_build: last_build.map(|number| crate::gateway::BuildRef { number }),
                last_completed_build: last_completed
                    .map(|number| crate::gateway::BuildRef { number }),
            }),
        );
    }

    /// Queues a failure for the next command with label `operation`.
    pub fn fail_next(&self, operation: &'static str, error: RemoteClientError) {
        self.push(operation, ScriptedReply::Fail(error));
    }

    /// Marks `name` as an existing job.
    pub fn seed_job(&self, name: JobName) {
        self.lock().jobs.insert(name);
    }

    /// Returns every command received so far.
    #[must_use]
    pub fn commands(&self) -> Vec<RemoteCommand> {
        self.lock().commands.clone()
    }

    /// Returns the operation labels of every command received so far.
    #[must_use]
    pub fn operations(&self) -> Vec<&'static str> {
        self.lock()
            .commands
            .iter()
            .map(RemoteCommand::operation)
            .collect()
    }

    /// Counts the commands received with label `operation`.
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        self.lock()
            .commands
            .iter()
            .filter(|command| command.operation() == operation)
            .count()
    }

    /// Reports whether the in-memory model still holds `name`.
    #[must_use]
    pub fn has_job(&self, name: &JobName) -> bool {
        self.lock().jobs.contains(name)
    }

    fn next_reply(&self, command: &RemoteCommand) -> ScriptedReply {
        let mut state = self.lock();
        state.commands.push(command.clone());
        let queued = state
            .queued
            .get_mut(command.operation())
            .and_then(VecDeque::pop_front);
        if let Some(reply) = queued {
            if !matches!(reply, ScriptedReply::Fail(_) | ScriptedReply::Hang) {
                apply_to_model(&mut state.jobs, command);
            }
            return reply;
        }

        let reply = match command {
            RemoteCommand::JobExists { name } => ScriptedReply::Exists(state.jobs.contains(name)),
            RemoteCommand::JobGet { .. } => ScriptedReply::Job(JobInfo::default()),
            RemoteCommand::BuildLog { .. } => ScriptedReply::Log(Vec::new()),
            RemoteCommand::JobCreate { .. }
            | RemoteCommand::JobConfig { .. }
            | RemoteCommand::JobBuild { .. }
            | RemoteCommand::JobDestroy { .. }
            | RemoteCommand::BuildStop { .. } => ScriptedReply::Ack,
        };
        apply_to_model(&mut state.jobs, command);
        reply
    }
}

fn apply_to_model(jobs: &mut BTreeSet<JobName>, command: &RemoteCommand) {
    match command {
        RemoteCommand::JobCreate { name, .. } => {
            jobs.insert(name.clone());
        }
        RemoteCommand::JobDestroy { name } => {
            jobs.remove(name);
        }
        _ => {}
    }
}

impl RemoteClient for ScriptedClient {
    fn execute<'a>(&'a self, command: &'a RemoteCommand) -> RemoteFuture<'a, RemoteReply> {
        let reply = self.next_reply(command);
        Box::pin(async move {
            match reply {
                ScriptedReply::Exists(exists) => Ok(RemoteReply::Exists(exists)),
                ScriptedReply::Job(info) => Ok(RemoteReply::Job(info)),
                ScriptedReply::Ack => Ok(RemoteReply::Ack),
                ScriptedReply::Log(chunks) => Ok(RemoteReply::Log(Box::pin(stream::iter(
                    chunks.into_iter().map(Ok),
                )))),
                ScriptedReply::Fail(error) => Err(error),
                ScriptedReply::Hang => futures::future::pending().await,
            }
        })
    }
}

/// Virtual clock whose `sleep` advances time instantly.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    state: Arc<Mutex<ClockState>>,
}

#[derive(Debug, Default)]
struct ClockState {
    offset: Duration,
    sleeps: Vec<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Creates a clock starting at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Arc::new(Mutex::new(ClockState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves virtual time forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        state.offset = state.offset.saturating_add(duration);
    }

    /// Returns the virtual time elapsed since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.lock().offset
    }

    /// Returns every sleep requested so far.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.lock().offset
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        {
            let mut state = self.lock();
            state.offset = state.offset.saturating_add(duration);
            state.sleeps.push(duration);
        }
        Box::pin(async {})
    }
}
