//! Message status state machine with validated transitions.
//!
//! Enforces forward-only delivery:
//! Sending -> Sent -> Delivered
//! Sending -> Delivered
//! Sending/Sent -> Error

use parlor_core::types::MessageStatus;

use crate::error::ChatError;

/// What applying a requested status means for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status moves forward.
    Apply,
    /// The message already sits in the requested terminal state.
    Unchanged,
}

/// Validate that a status transition is allowed.
///
/// Valid transitions:
/// - Sending -> Sent
/// - Sending -> Delivered
/// - Sending -> Error
/// - Sent -> Delivered
/// - Sent -> Error
pub fn validate_transition(from: MessageStatus, to: MessageStatus) -> Result<(), ChatError> {
    let valid = matches!(
        (from, to),
        (MessageStatus::Sending, MessageStatus::Sent)
            | (MessageStatus::Sending, MessageStatus::Delivered)
            | (MessageStatus::Sending, MessageStatus::Error)
            | (MessageStatus::Sent, MessageStatus::Delivered)
            | (MessageStatus::Sent, MessageStatus::Error)
    );

    if valid {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition { from, to })
    }
}

/// Plan a transition, treating re-affirmation of a terminal state as a no-op.
pub fn plan_transition(from: MessageStatus, to: MessageStatus) -> Result<Transition, ChatError> {
    if from == to && from.is_terminal() {
        return Ok(Transition::Unchanged);
    }
    validate_transition(from, to).map(|()| Transition::Apply)
}
