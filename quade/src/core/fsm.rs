//! Record status state machine.
//!
//! Transitions are looked up in a static table before any status mutation, so a
//! record that already left `NOT_READY` can never be executed again.

use std::fmt;

use thiserror::Error;

use crate::core::types::RecordStatus;

/// Events that drive a record's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordEvent {
    /// Execution finished and the report was stored.
    Execute,
    /// Execution raised; the rendered error was stored.
    Fail,
}

impl RecordEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordEvent::Execute => "execute",
            RecordEvent::Fail => "fail",
        }
    }
}

impl fmt::Display for RecordEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(source, event) -> target`. Anything missing here is rejected.
const TRANSITIONS: &[(RecordStatus, RecordEvent, RecordStatus)] = &[
    (
        RecordStatus::NotReady,
        RecordEvent::Execute,
        RecordStatus::Ready,
    ),
    (
        RecordStatus::NotReady,
        RecordEvent::Fail,
        RecordStatus::Failed,
    ),
];

/// The requested transition is not in the table for the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("transition '{event}' not allowed from status '{from}'")]
pub struct TransitionNotAllowed {
    pub from: RecordStatus,
    pub event: RecordEvent,
}

/// Resolve the target status for `event` from `from`.
pub fn transition(
    from: RecordStatus,
    event: RecordEvent,
) -> Result<RecordStatus, TransitionNotAllowed> {
    TRANSITIONS
        .iter()
        .find(|(source, candidate, _)| *source == from && *candidate == event)
        .map(|(_, _, target)| *target)
        .ok_or(TransitionNotAllowed { from, event })
}

/// True if `event` may fire from `from`.
pub fn can_transition(from: RecordStatus, event: RecordEvent) -> bool {
    transition(from, event).is_ok()
}
