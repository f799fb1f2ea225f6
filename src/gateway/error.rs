//! Error types for remote calls and the command gateway.

use std::time::Duration;

use thiserror::Error;

/// Failures reported by a [`super::RemoteClient`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RemoteClientError {
    /// The server answered with a non-success status.
    #[error("remote returned HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// The request never produced a response.
    #[error("transport error: {message}")]
    Transport {
        /// Message from the HTTP client.
        message: String,
    },
    /// The response could not be decoded.
    #[error("failed to decode response: {message}")]
    Decode {
        /// Decoder error message.
        message: String,
    },
}

/// Errors surfaced by [`super::CommandGateway`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum GatewayError {
    /// The breaker is open and the call was rejected without reaching the
    /// server.
    #[error("circuit breaker open; retry in {} ms", .retry_after.as_millis())]
    CircuitOpen {
        /// Time left before the breaker admits a trial call.
        retry_after: Duration,
    },
    /// The call did not finish within the gateway call timeout.
    #[error("{operation} timed out after {} ms", .after.as_millis())]
    Timeout {
        /// Operation that timed out (for example `job.get`).
        operation: &'static str,
        /// Configured call timeout.
        after: Duration,
    },
    /// The remote call failed.
    #[error("{operation} failed: {source}")]
    Remote {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying client error.
        #[source]
        source: RemoteClientError,
    },
    /// The client answered with a reply of the wrong shape.
    #[error("{operation} returned an unexpected {reply} reply")]
    UnexpectedReply {
        /// Operation that was issued.
        operation: &'static str,
        /// Kind of reply that came back.
        reply: &'static str,
    },
}

impl GatewayError {
    /// Reports whether the call was rejected by an open breaker.
    #[must_use]
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}
