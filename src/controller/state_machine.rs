//! Finite state machine for DragonflyDb creation status.
//!
//! The persisted status has two states. `Uninitialized` (created=false) moves
//! to `Created` (created=true) once every child resource exists and the
//! status write succeeds. `Created` is terminal: no event leaves it, and
//! failures never produce a transition, they leave the resource
//! `Uninitialized` for the next attempt.

use std::fmt;

use thiserror::Error;

use crate::crd::DragonflyDbStatus;

/// Creation state derived from the persisted status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreationPhase {
    /// Child resources have not (all) been created yet
    Uninitialized,
    /// All child resources were created; terminal
    Created,
}

impl CreationPhase {
    /// Read the phase from a (possibly absent) status
    pub fn of(status: Option<&DragonflyDbStatus>) -> Self {
        if status.is_some_and(|s| s.created) {
            CreationPhase::Created
        } else {
            CreationPhase::Uninitialized
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CreationPhase::Created)
    }

    /// Status to persist for this phase at `generation`
    pub fn status(&self, generation: Option<i64>) -> DragonflyDbStatus {
        match self {
            CreationPhase::Uninitialized => DragonflyDbStatus::default(),
            CreationPhase::Created => DragonflyDbStatus::created_at(generation),
        }
    }
}

impl fmt::Display for CreationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationPhase::Uninitialized => write!(f, "Uninitialized"),
            CreationPhase::Created => write!(f, "Created"),
        }
    }
}

/// Events that trigger status transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreationEvent {
    /// Every child resource from the factory has been created
    ChildrenCreated,
}

impl fmt::Display for CreationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationEvent::ChildrenCreated => write!(f, "ChildrenCreated"),
        }
    }
}

/// A state transition definition
#[derive(Debug)]
struct Transition {
    from: CreationPhase,
    to: CreationPhase,
    event: CreationEvent,
    description: &'static str,
}

const TRANSITIONS: &[Transition] = &[Transition {
    from: CreationPhase::Uninitialized,
    to: CreationPhase::Created,
    event: CreationEvent::ChildrenCreated,
    description: "All child resources created",
}];

/// Rejected transition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no transition from {from} on {event}")]
pub struct TransitionError {
    pub from: CreationPhase,
    pub event: CreationEvent,
}

/// State machine guarding status transitions
#[derive(Debug, Default, Clone, Copy)]
pub struct CreationStateMachine;

impl CreationStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Check if an event is valid from the given phase
    pub fn can_transition(&self, from: CreationPhase, event: CreationEvent) -> bool {
        TRANSITIONS.iter().any(|t| t.from == from && t.event == event)
    }

    /// Apply an event, returning the target phase
    pub fn transition(
        &self,
        from: CreationPhase,
        event: CreationEvent,
    ) -> Result<CreationPhase, TransitionError> {
        TRANSITIONS
            .iter()
            .find(|t| t.from == from && t.event == event)
            .map(|t| {
                tracing::debug!(from = %t.from, to = %t.to, event = %t.event, "{}", t.description);
                t.to
            })
            .ok_or(TransitionError { from, event })
    }
}
