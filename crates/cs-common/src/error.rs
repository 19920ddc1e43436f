//! Error types for csctl.
//!
//! The taxonomy mirrors the propagation policy of the engine:
//! - Item-level errors (`NotFound`, `Duplicate`, `ProcessOp`) are logged per
//!   item inside a batch and never abort sibling items.
//! - `Store` and `Validation` errors abort the whole invocation.
//!
//! Every failure produces a human-readable status line before the process
//! continues or exits; no failure is silent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for csctl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Installed-catalog and PID-file lookups.
    Catalog,
    /// Signal delivery and process spawning.
    Lifecycle,
    /// Script rendering, writing, and linking.
    Provision,
    /// Registry store access and reconciliation.
    Registry,
    /// User input validation.
    Validation,
    /// File I/O and serialization.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Catalog => write!(f, "catalog"),
            ErrorCategory::Lifecycle => write!(f, "lifecycle"),
            ErrorCategory::Provision => write!(f, "provision"),
            ErrorCategory::Registry => write!(f, "registry"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for csctl.
#[derive(Error, Debug)]
pub enum Error {
    /// A service, script, or PID file was expected but absent. Benign inside
    /// batches: report and continue.
    #[error("not found: {0}")]
    NotFound(String),

    /// A service or registry entry already exists. The item is skipped.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Signal delivery or spawn failed for one service.
    #[error("process operation failed for {service}: {reason}")]
    ProcessOp { service: String, reason: String },

    /// Registry store connect/fetch/update failure. Aborts the invocation.
    #[error("registry store failure: {0}")]
    Store(String),

    /// Missing or malformed user input. Aborts with a usage error.
    #[error("{0}")]
    Validation(String),

    /// Template rendering failure during provisioning.
    #[error("template render failed: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error category for grouping.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound(_) => ErrorCategory::Catalog,
            Error::Duplicate(_) => ErrorCategory::Provision,
            Error::ProcessOp { .. } => ErrorCategory::Lifecycle,
            Error::Store(_) => ErrorCategory::Registry,
            Error::Validation(_) => ErrorCategory::Validation,
            Error::Render(_) => ErrorCategory::Provision,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Whether this error aborts the whole invocation.
    ///
    /// Item-level errors are isolated per item inside batch operations;
    /// store and validation errors stop further processing.
    pub fn aborts_invocation(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Validation(_))
    }

    /// Whether a retry of the same operation could plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::NotFound(_) => false,
            Error::Duplicate(_) => false,
            Error::ProcessOp { .. } => true,
            Error::Store(_) => true,
            Error::Validation(_) => false,
            Error::Render(_) => false,
            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_level_errors_do_not_abort() {
        assert!(!Error::NotFound("cstask-9".into()).aborts_invocation());
        assert!(!Error::Duplicate("cstask-1".into()).aborts_invocation());
        assert!(!Error::ProcessOp {
            service: "cstask-1".into(),
            reason: "ESRCH".into()
        }
        .aborts_invocation());
    }

    #[test]
    fn store_and_validation_abort() {
        assert!(Error::Store("lock timeout".into()).aborts_invocation());
        assert!(Error::Validation("missing service name".into()).aborts_invocation());
    }

    #[test]
    fn categories() {
        assert_eq!(
            Error::Store("x".into()).category(),
            ErrorCategory::Registry
        );
        assert_eq!(
            Error::ProcessOp {
                service: "s".into(),
                reason: "r".into()
            }
            .category(),
            ErrorCategory::Lifecycle
        );
        assert_eq!(ErrorCategory::Catalog.to_string(), "catalog");
    }
}
