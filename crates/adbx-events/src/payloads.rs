//! Event payloads published by the operation engine.

use adbx_core::{OperationId, OperationKind, Relation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to each published event.
pub type EventId = u64;

/// Default size of the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed engine events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An operation was accepted by the queue.
    OperationQueued {
        /// Operation identifier.
        operation_id: OperationId,
        /// Kind of work.
        kind: OperationKind,
        /// Target device.
        device_id: String,
    },
    /// A worker picked the operation up.
    OperationStarted {
        /// Operation identifier.
        operation_id: OperationId,
        /// Kind of work.
        kind: OperationKind,
    },
    /// Progress of a running transfer advanced.
    OperationProgress {
        /// Operation identifier.
        operation_id: OperationId,
        /// Completion fraction in `0.0..=1.0`.
        progress: f64,
    },
    /// The operation finished successfully.
    OperationCompleted {
        /// Operation identifier.
        operation_id: OperationId,
        /// Kind of work.
        kind: OperationKind,
    },
    /// The operation finished with an error.
    OperationFailed {
        /// Operation identifier.
        operation_id: OperationId,
        /// Kind of work.
        kind: OperationKind,
        /// Human-readable failure text.
        message: String,
    },
    /// The operation was canceled.
    OperationCanceled {
        /// Operation identifier.
        operation_id: OperationId,
        /// Kind of work.
        kind: OperationKind,
    },
    /// A finished operation touched a path; carries its relation to the
    /// displayed directory.
    PathAffected {
        /// Operation that touched the path.
        operation_id: OperationId,
        /// Affected full path.
        path: String,
        /// Relation of the path to the displayed directory.
        relation: Relation,
    },
    /// The progress side channel is unavailable and estimates are used instead.
    ProgressFallback {
        /// Reason the side channel could not be prepared.
        message: String,
    },
    /// The device tool is missing or older than the supported release.
    ToolUnsupported {
        /// Version reported by the tool, `None` when it could not be read.
        found: Option<String>,
        /// Oldest supported version.
        required: String,
    },
}

impl Event {
    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OperationQueued { .. } => "operation_queued",
            Self::OperationStarted { .. } => "operation_started",
            Self::OperationProgress { .. } => "operation_progress",
            Self::OperationCompleted { .. } => "operation_completed",
            Self::OperationFailed { .. } => "operation_failed",
            Self::OperationCanceled { .. } => "operation_canceled",
            Self::PathAffected { .. } => "path_affected",
            Self::ProgressFallback { .. } => "progress_fallback",
            Self::ToolUnsupported { .. } => "tool_unsupported",
        }
    }

    /// Operation the event refers to, if any.
    #[must_use]
    pub const fn operation_id(&self) -> Option<OperationId> {
        match self {
            Self::OperationQueued { operation_id, .. }
            | Self::OperationStarted { operation_id, .. }
            | Self::OperationProgress { operation_id, .. }
            | Self::OperationCompleted { operation_id, .. }
            | Self::OperationFailed { operation_id, .. }
            | Self::OperationCanceled { operation_id, .. }
            | Self::PathAffected { operation_id, .. } => Some(*operation_id),
            Self::ProgressFallback { .. } | Self::ToolUnsupported { .. } => None,
        }
    }
}

/// Event plus the id and time it was published at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Publication time.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn events_serialize_with_snake_case_tag() -> Result<(), Box<dyn std::error::Error>> {
        let event = Event::PathAffected {
            operation_id: Uuid::nil(),
            path: "/sd/docs/report.txt".into(),
            relation: Relation::Descendant,
        };
        let json = serde_json::to_value(&event)?;
        assert_eq!(json["type"], "path_affected");
        assert_eq!(json["relation"], "descendant");
        assert_eq!(event.kind(), "path_affected");
        assert_eq!(event.operation_id(), Some(Uuid::nil()));

        let fallback = Event::ProgressFallback {
            message: "x".into(),
        };
        assert_eq!(fallback.operation_id(), None);
        Ok(())
    }
}
