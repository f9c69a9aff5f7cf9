//! Error and retry-policy types for the Quill pipeline domain.
//!
//! The taxonomy mirrors how a run can go wrong:
//!
//! - [`RequestError`]: the caller's input was unusable; rejected before any
//!   stage runs.
//! - [`GenerationError`] / [`StoreError`]: a port (generator, persistence,
//!   memory) failed. Stages convert these into their documented fallback.
//! - [`StageError`]: a stage could not produce a usable value. Most stages
//!   degrade to a fallback; drafting (and planning under a terminal policy)
//!   ends the run.
//! - [`QuillError`]: process-level problems (configuration) that stop the
//!   binary from starting at all.
//!
//! [`RetryPolicy`] is a cross-cutting concern: transport layers that retry
//! beneath the stages decide from it whether a failed call is worth repeating.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifiers::RunId;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Stages never retry. A transport decorator may consult this to repeat a call
/// transparently without changing any stage contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt (e.g. from `Retry-After`).
        /// `None` means apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Caller input errors
// ---------------------------------------------------------------------------

/// Reasons a request is rejected before the pipeline starts.
///
/// These are reported to the caller as "bad request", distinct from a run that
/// started and produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RequestError {
    /// The brief is missing or contains only whitespace.
    #[error("No brief provided.")]
    EmptyBrief,

    /// The brief exceeds the configured character cap.
    #[error("Brief is too long: {length} characters (limit {limit}).")]
    BriefTooLong {
        /// Length of the submitted brief, in characters.
        length: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Both an authenticated id and an anonymous id were supplied.
    #[error("A request may carry a user id or an anonymous id, not both.")]
    ConflictingIdentity,

    /// Refinement context was partially supplied.
    #[error("Refinement context is incomplete: missing {missing}.")]
    PartialRefinement {
        /// Which half of the refinement context is absent.
        missing: String,
    },
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failure of one call to the generative-text capability.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// No provider (or no credential) is configured.
    #[error("generator not configured: {0}")]
    NotConfigured(String),

    /// The request could not be delivered or the connection dropped.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider did not answer within the transport timeout.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// The provider rejected the call because of rate limiting.
    #[error("rate limited by provider")]
    RateLimited {
        /// Delay suggested by the provider, when it sent one.
        retry_after: Option<Duration>,
    },

    /// The provider returned a non-success status.
    #[error("provider error ({status}): {message}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Sanitised error text (never contains credentials).
        message: String,
    },

    /// The provider answered successfully but with no content.
    #[error("provider returned no content")]
    EmptyResponse,
}

impl GenerationError {
    /// How a transport layer should treat this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            GenerationError::Transport(_) | GenerationError::Timeout(_) => {
                RetryPolicy::Retryable { after: None }
            }
            GenerationError::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            GenerationError::Provider { status, .. } if *status >= 500 => {
                RetryPolicy::Retryable { after: None }
            }
            GenerationError::Provider { .. }
            | GenerationError::NotConfigured(_)
            | GenerationError::EmptyResponse => RetryPolicy::NonRetryable,
        }
    }
}

/// Failure of the persistence or memory collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend reported an error.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored value could not be (de)serialised.
    #[error("storage serialization error: {0}")]
    Serialization(String),

    /// No run is stored under this id.
    #[error("no saved run {0}")]
    RunNotFound(RunId),

    /// The run has no judge verdict to compare against (a refine run).
    #[error("run {0} has no judge verdict")]
    NoVerdict(RunId),
}

// ---------------------------------------------------------------------------
// Stage errors
// ---------------------------------------------------------------------------

/// Why a stage could not produce its output.
#[derive(Debug, Error)]
pub enum StageError {
    /// The generative call itself failed.
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// The call returned text that does not parse into the expected shape.
    #[error("malformed output: {0}")]
    Malformed(String),

    /// The call returned text that is empty once wrapping is stripped.
    #[error("empty output: {0}")]
    Empty(String),
}

// ---------------------------------------------------------------------------
// Process-level errors
// ---------------------------------------------------------------------------

/// Errors that prevent the pipeline from being constructed.
#[derive(Debug, Error)]
pub enum QuillError {
    /// The runtime configuration is invalid.
    ///
    /// Produced at load time; the executor never starts with an invalid config.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },

    /// A provider credential named in the configuration is not available.
    #[error("Credential '{name}' is not set")]
    MissingCredential {
        /// Environment variable (or key) that was expected to hold the credential.
        name: String,
    },
}
