//! Span helpers for the process and for individual operations.

use std::fmt::Display;

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the process-level span entered for its lifetime.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the process-level span tagged with the running command.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "adbx",
            command = %command,
            build_sha = %build_sha()
        )));
        Self {
            _guard: span.enter(),
        }
    }
}

/// Span wrapping all work done for one operation.
#[must_use]
pub fn operation_span(operation_id: impl Display, kind: &str, device_id: &str) -> Span {
    tracing::info_span!(
        "operation",
        operation_id = %operation_id,
        kind = %kind,
        device = %device_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_build_without_subscriber() {
        let span = operation_span(42, "pull", "emulator-5554");
        let _entered = span.enter();
        let _guard = GlobalContextGuard::new("ls");
    }
}
