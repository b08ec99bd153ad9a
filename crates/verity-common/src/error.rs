//! Error types for verity
//!
//! Errors are structured with fields so a failed verification run explains
//! itself: which resource, which namespace, how long we waited, and what the
//! backing store last told us.
//!
//! Fetch-level failures never show up here directly. The pollers absorb them
//! as `TransientError` outcomes and only surface [`Error::DeadlineExceeded`]
//! once the wait is over.

use std::time::Duration;

use thiserror::Error;

use crate::kube_utils::STATUS_TOO_MANY_REQUESTS;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for verity operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A poller gave up because its deadline elapsed
    #[error("timed out after {waited:?} waiting for {description}; last observed: {last_observed}")]
    DeadlineExceeded {
        /// What was being waited for
        description: String,
        /// How long the poller waited before giving up
        waited: Duration,
        /// Last known outcome per resource, rendered for diagnosis
        last_observed: String,
    },

    /// The clean-slate protocol could not reach an empty baseline
    #[error("clean slate failed for namespace {namespace} after {waited:?}: {message}")]
    CleanupFailure {
        /// Namespace that is still observably present
        namespace: String,
        /// How long the coordinator waited
        waited: Duration,
        /// Description of the last observation
        message: String,
    },

    /// An observed value differs from the expected one
    #[error("assertion failed for {resource}: {field} expected {expected}, got {actual}")]
    AssertionMismatch {
        /// Resource the assertion was made against (kind/namespace/name)
        resource: String,
        /// Field path that was checked (e.g. "spec.disableAdmin")
        field: String,
        /// Expected value
        expected: String,
        /// Observed value
        actual: String,
    },

    /// Manifest could not be read, parsed or applied
    #[error("manifest error for {path}: {message}")]
    Manifest {
        /// Manifest path (or "-" for inline manifests)
        path: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Invalid configuration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's invalid
        message: String,
    },

    /// One or more scenarios did not pass
    #[error("{failed} scenario(s) failed in {suite}: {names}")]
    ScenariosFailed {
        /// Suite name
        suite: String,
        /// Number of failed scenarios
        failed: usize,
        /// Comma-separated failed scenario names
        names: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "runner", "applier")
        context: String,
    },
}

impl Error {
    /// Create a deadline error
    pub fn deadline_exceeded(
        description: impl Into<String>,
        waited: Duration,
        last_observed: impl Into<String>,
    ) -> Self {
        Self::DeadlineExceeded {
            description: description.into(),
            waited,
            last_observed: last_observed.into(),
        }
    }

    /// Create a clean-slate failure for a namespace
    pub fn cleanup_failure(
        namespace: impl Into<String>,
        waited: Duration,
        message: impl Into<String>,
    ) -> Self {
        Self::CleanupFailure {
            namespace: namespace.into(),
            waited,
            message: message.into(),
        }
    }

    /// Create an assertion mismatch
    pub fn assertion_mismatch(
        resource: impl Into<String>,
        field: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::AssertionMismatch {
            resource: resource.into(),
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a manifest error
    pub fn manifest(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Only used for single mutation requests (create/delete/patch). Poll
    /// rounds never consult this: every failed fetch is retried until the
    /// deadline.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // 4xx means the request itself is wrong (or already applied);
                // 429 only means the server is throttling
                !matches!(
                    source,
                    kube::Error::Api(ae)
                        if (400..500).contains(&ae.code) && ae.code != STATUS_TOO_MANY_REQUESTS
                )
            }
            Error::Internal { .. } => true,
            Error::DeadlineExceeded { .. }
            | Error::CleanupFailure { .. }
            | Error::AssertionMismatch { .. }
            | Error::Manifest { .. }
            | Error::Serialization { .. }
            | Error::Config { .. }
            | Error::ScenariosFailed { .. } => false,
        }
    }

    /// True when a poller ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::DeadlineExceeded { .. })
    }

    /// True when the error invalidates every later scenario in the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::CleanupFailure { .. })
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Internal { context, .. } => Some(context),
            Error::Manifest { path, .. } => Some(path),
            Error::CleanupFailure { namespace, .. } => Some(namespace),
            _ => None,
        }
    }
}
