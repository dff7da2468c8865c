//! Error types for the request gate.
//!
//! Only [`GateError`] ever reaches a caller, and only while a gate is being
//! built. Everything that can go wrong while handling a request is recovered
//! inside the gate and, at most, reported through `tracing`.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while resolving configuration or building a gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// A collector or patterns endpoint is not an absolute URL.
    #[error("Invalid {name} endpoint '{value}': {source}")]
    InvalidEndpoint {
        /// Which endpoint (`collect` or `patterns`)
        name: &'static str,
        /// The rejected value
        value: String,
        /// Underlying parse failure
        #[source]
        source: url::ParseError,
    },

    /// A pattern exclusion rule does not compile.
    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidExcludePattern {
        /// The rejected pattern
        pattern: String,
        /// Underlying regex failure
        #[source]
        source: regex::Error,
    },
}

/// Failures reported by the detection SDK's network capabilities.
///
/// `Clone` because a single pattern-sync outcome is handed to every caller
/// that joined the in-flight run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// The collector or patterns service could not be reached.
    #[error("Transport error: {details}")]
    Transport {
        /// Error details
        details: String,
    },

    /// The remote service answered with a non-success status.
    #[error("Unexpected status {code}")]
    Status {
        /// HTTP status code
        code: u16,
    },

    /// The background task running the call panicked or was cancelled.
    #[error("Task aborted: {details}")]
    Aborted {
        /// Error details
        details: String,
    },
}

/// A deadline expired before the raced operation settled.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Deadline elapsed after {after:?}")]
pub struct DeadlineElapsed {
    /// The configured deadline
    pub after: Duration,
}

/// Why a visit report did not complete.
///
/// Never surfaced to the client; logged in debug mode only.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The SDK rejected or failed the log call.
    #[error(transparent)]
    Sdk(#[from] SdkError),

    /// The blocked-visit report lost its race against the logging timeout.
    #[error("Logging timeout: {0}")]
    Deadline(#[from] DeadlineElapsed),

    /// The spawned report task panicked.
    #[error("Report task aborted: {details}")]
    Aborted {
        /// Error details
        details: String,
    },
}

impl From<tokio::task::JoinError> for ReportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ReportError::Aborted {
            details: err.to_string(),
        }
    }
}
