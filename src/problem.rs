//! Problem taxonomy for the rolling-restart orchestrator
//!
//! Every failure encountered while acting on a pod is classified into one
//! of four escalation tiers. Forceable and Unforceable problems are
//! absorbed by the retry loop and only escape once their budget is
//! exhausted; Fatal aborts the whole run; Interrupted is cooperative
//! cancellation, not a true error.

use thiserror::Error;

use crate::error::Error;

/// Classified failure raised while trying to act on a pod.
///
/// Display renders the message verbatim; the underlying cause, when
/// present, is reachable through `std::error::Error::source`.
#[derive(Error, Debug)]
pub enum Problem {
    /// Recoverable; once the pod's retry budget is exhausted the action is
    /// forced (safety checks bypassed) rather than abandoned.
    #[error("{message}")]
    Forceable {
        message: String,
        #[source]
        cause: Option<Error>,
    },

    /// Recoverable but never forced; the pod is retried on its own backoff
    /// while other pods keep progressing.
    #[error("{message}")]
    Unforceable {
        message: String,
        #[source]
        cause: Option<Error>,
    },

    /// Aborts the entire run immediately with this cause.
    #[error("{message}")]
    Fatal {
        message: String,
        #[source]
        cause: Option<Error>,
    },

    /// Cooperative cancellation; the run is incomplete and safe to re-invoke.
    #[error("Rolling restart interrupted")]
    Interrupted,
}

impl Problem {
    pub fn forceable(message: impl Into<String>) -> Self {
        Problem::Forceable {
            message: message.into(),
            cause: None,
        }
    }

    pub fn forceable_with(message: impl Into<String>, cause: Error) -> Self {
        Problem::Forceable {
            message: message.into(),
            cause: Some(cause),
        }
    }

    pub fn unforceable(message: impl Into<String>) -> Self {
        Problem::Unforceable {
            message: message.into(),
            cause: None,
        }
    }

    pub fn unforceable_with(message: impl Into<String>, cause: Error) -> Self {
        Problem::Unforceable {
            message: message.into(),
            cause: Some(cause),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Problem::Fatal {
            message: message.into(),
            cause: None,
        }
    }

    pub fn fatal_with(message: impl Into<String>, cause: Error) -> Self {
        Problem::Fatal {
            message: message.into(),
            cause: Some(cause),
        }
    }

    pub fn is_forceable(&self) -> bool {
        matches!(self, Problem::Forceable { .. })
    }

    pub fn is_unforceable(&self) -> bool {
        matches!(self, Problem::Unforceable { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Problem::Fatal { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Problem::Interrupted)
    }
}
