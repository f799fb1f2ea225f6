//! Executor abstraction consumed by the pipeline orchestrator.
//!
//! The orchestrator only ever talks to this trait: it asks a backend to start
//! a build, stop it, or stream its log. Request value types live here too so
//! every backend validates its inputs the same way.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

use crate::gateway::RemoteClientError;

/// Parameters required to start a build.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildRequest {
    /// Identifier of the build; also the suffix of the remote job name.
    pub build_id: BuildId,
    /// Container image the build runs in (for example `node:4`).
    pub container: String,
    /// Token the build uses to act on behalf of itself against the API.
    pub token: String,
    /// Free-form annotations that can override per-build policy.
    pub annotations: BTreeMap<String, Value>,
}

impl BuildRequest {
    /// Starts a builder for a [`BuildRequest`].
    #[must_use]
    pub fn builder() -> BuildRequestBuilder {
        BuildRequestBuilder::new()
    }

    /// Validates the request, returning a descriptive error when a required
    /// field is missing or malformed.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when the build id, container or
    /// token is empty, when the build id contains whitespace or control
    /// characters, or when the container contains control characters.
    pub fn validate(&self) -> Result<(), RequestError> {
        self.build_id.validate()?;
        if self.container.is_empty() || self.container.chars().any(char::is_control) {
            return Err(RequestError::Validation("container".to_owned()));
        }
        if self.token.is_empty() {
            return Err(RequestError::Validation("token".to_owned()));
        }
        Ok(())
    }
}

/// Builder for [`BuildRequest`] that defers trimming and validation to
/// construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildRequestBuilder {
    build_id: String,
    container: String,
    token: String,
    annotations: BTreeMap<String, Value>,
}

impl BuildRequestBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the build identifier.
    #[must_use]
    pub fn build_id(mut self, value: impl Into<String>) -> Self {
        self.build_id = value.into();
        self
    }

    /// Sets the container image.
    #[must_use]
    pub fn container(mut self, value: impl Into<String>) -> Self {
        self.container = value.into();
        self
    }

    /// Sets the build token.
    #[must_use]
    pub fn token(mut self, value: impl Into<String>) -> Self {
        self.token = value.into();
        self
    }

    /// Adds a single annotation, replacing any previous value for `key`.
    #[must_use]
    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Replaces all annotations.
    #[must_use]
    pub fn annotations(mut self, value: BTreeMap<String, Value>) -> Self {
        self.annotations = value;
        self
    }

    /// Builds and validates the [`BuildRequest`], trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when a required field is empty or
    /// malformed.
    pub fn build(self) -> Result<BuildRequest, RequestError> {
        let request = BuildRequest {
            build_id: BuildId::new(self.build_id.trim()),
            container: self.container.trim().to_owned(),
            token: self.token.trim().to_owned(),
            annotations: self.annotations,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Identifier of a single build.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BuildId(String);

impl BuildId {
    /// Wraps an identifier without validating it.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rejects empty identifiers and identifiers that contain whitespace or
    /// control characters.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] naming the `build_id` field.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.0.is_empty()
            || self
                .0
                .chars()
                .any(|ch| ch.is_whitespace() || ch.is_control())
        {
            return Err(RequestError::Validation("build_id".to_owned()));
        }
        Ok(())
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BuildId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifies the job whose periodic schedule is being changed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeriodicRequest {
    /// Orchestrator job identifier.
    pub job_id: String,
}

/// Errors raised while validating requests.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a request is missing a required field.
    #[error("missing or invalid field: {0}")]
    Validation(String),
}

/// Live log of a build. Ends when the build finishes and cannot be restarted.
pub type LogStream = BoxStream<'static, Result<Bytes, RemoteClientError>>;

/// Future returned by executor operations.
pub type ExecutorFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Interface implemented by build executors.
pub trait Executor {
    /// Backend specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Provisions the remote job for `request` and triggers a build.
    fn start<'a>(&'a self, request: &'a BuildRequest) -> ExecutorFuture<'a, (), Self::Error>;

    /// Stops the most recent build of `build_id` and removes its job.
    fn stop<'a>(&'a self, build_id: &'a BuildId) -> ExecutorFuture<'a, (), Self::Error>;

    /// Streams the log of the most recent build of `build_id`.
    fn stream<'a>(&'a self, build_id: &'a BuildId)
    -> ExecutorFuture<'a, LogStream, Self::Error>;

    /// Registers a periodic build. Backends without periodic support
    /// acknowledge the call and do nothing.
    fn start_periodic<'a>(
        &'a self,
        request: &'a PeriodicRequest,
    ) -> ExecutorFuture<'a, (), Self::Error> {
        let _ = request;
        Box::pin(async { Ok(()) })
    }

    /// Removes a periodic build. Backends without periodic support
    /// acknowledge the call and do nothing.
    fn stop_periodic<'a>(
        &'a self,
        request: &'a PeriodicRequest,
    ) -> ExecutorFuture<'a, (), Self::Error> {
        let _ = request;
        Box::pin(async { Ok(()) })
    }
}
