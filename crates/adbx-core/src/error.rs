//! Error types for path manipulation and request validation.

use thiserror::Error;

use crate::model::OperationKind;

/// Primary error type for the path model and operation DTOs.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or out-of-domain path manipulation.
    #[error("invalid path")]
    InvalidPath {
        /// Operation that rejected the path.
        operation: &'static str,
        /// Offending path (or path fragment).
        path: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// A recycle filename did not decode into a recycle index entry.
    #[error("corrupt trash entry")]
    CorruptTrashEntry {
        /// Trashed filename that failed to decode.
        name: String,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// Batch expansion was requested for an operation kind that has no batch form.
    #[error("unsupported batch operation")]
    UnsupportedBatch {
        /// Operation kind supplied by the caller.
        kind: OperationKind,
    },
}

impl CoreError {
    pub(crate) fn invalid_path(
        operation: &'static str,
        path: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidPath {
            operation,
            path: path.into(),
            reason,
        }
    }

    pub(crate) fn corrupt_trash(name: impl Into<String>, reason: &'static str) -> Self {
        Self::CorruptTrashEntry {
            name: name.into(),
            reason,
        }
    }

    /// Short taxonomy label used when a failure has no richer text to show.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InvalidPath { reason, .. } | Self::CorruptTrashEntry { reason, .. } => reason,
            Self::UnsupportedBatch { .. } => "operation kind has no batch form",
        }
    }
}

/// Convenience alias for core results.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_build_variants_with_context() {
        let err = CoreError::invalid_path("parent", "/", "root has no parent");
        assert!(matches!(
            err,
            CoreError::InvalidPath {
                operation: "parent",
                ..
            }
        ));
        assert_eq!(err.to_string(), "invalid path");
        assert_eq!(err.label(), "root has no parent");

        let err = CoreError::corrupt_trash("junk", "missing separator");
        assert_eq!(err.to_string(), "corrupt trash entry");
        assert_eq!(err.label(), "missing separator");
    }
}
