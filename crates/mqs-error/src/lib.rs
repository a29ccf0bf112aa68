// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy for the mq-stream client.
//!
//! Every failure in the client surfaces as an [`MqError`]. Each variant maps
//! to a broad [`ErrorKind`] so callers can branch on the failure family
//! (configuration, transport, parse, validation, pipeline) without matching
//! individual variants.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Broad family that an [`MqError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid client configuration (token, project id, queue
    /// name, endpoint options). Detected eagerly, never silently defaulted.
    Config,
    /// Network-level failure or a non-2xx response status. Terminal; the
    /// client never retries on its own.
    Transport,
    /// Malformed or truncated JSON in a response, or an item that cannot be
    /// serialised into a request body.
    Parse,
    /// A well-formed response that lacks the expected success marker.
    Validation,
    /// Pipeline teardown: the operation was aborted after another stage
    /// already reported the underlying fault.
    Pipeline,
}

impl ErrorKind {
    /// Stable lowercase name for the kind (e.g. `"transport"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Transport => "transport",
            Self::Parse => "parse",
            Self::Validation => "validation",
            Self::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MqError
// ---------------------------------------------------------------------------

/// Any error produced by the mq-stream client.
#[derive(Debug, thiserror::Error)]
pub enum MqError {
    /// No OAuth token was supplied.
    #[error("no token supplied for the queue service")]
    MissingToken,

    /// The project id is empty.
    #[error("project id is required and cannot be empty")]
    MissingProjectId,

    /// The queue name is empty.
    #[error("queue name is required and cannot be empty")]
    MissingQueueName,

    /// Some other endpoint or client option is invalid.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The underlying HTTP request failed (connect, reset, timeout).
    #[error("request failed")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("queue service returned status {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Snippet of the response body, for diagnostics.
        detail: String,
    },

    /// A response body (or a streamed fragment of one) is not valid JSON,
    /// or an item could not be coerced into the wire shape.
    #[error("parse error: {reason}")]
    Parse {
        /// What failed to parse and why.
        reason: String,
    },

    /// An outgoing item failed to serialise to JSON.
    #[error("failed to serialize item")]
    Serialize(#[source] serde_json::Error),

    /// The response was well-formed JSON but did not carry the expected
    /// success marker.
    #[error("validation failed: {reason}")]
    Validation {
        /// What the response was missing or carrying instead.
        reason: String,
    },

    /// The pipeline was torn down after another stage faulted; the concrete
    /// fault has already been surfaced to the terminal observer.
    #[error("pipeline aborted")]
    Aborted,
}

impl MqError {
    /// Build an [`MqError::InvalidConfig`].
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Build an [`MqError::Status`].
    pub fn status(status: u16, detail: impl Into<String>) -> Self {
        Self::Status {
            status,
            detail: detail.into(),
        }
    }

    /// Build an [`MqError::Parse`].
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Build an [`MqError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// The broad [`ErrorKind`] this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingToken
            | Self::MissingProjectId
            | Self::MissingQueueName
            | Self::InvalidConfig { .. } => ErrorKind::Config,

            Self::Request(_) | Self::Status { .. } => ErrorKind::Transport,

            Self::Parse { .. } | Self::Serialize(_) => ErrorKind::Parse,

            Self::Validation { .. } => ErrorKind::Validation,

            Self::Aborted => ErrorKind::Pipeline,
        }
    }

    /// Whether this is the generic teardown error rather than a root cause.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
