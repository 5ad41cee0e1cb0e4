//! Error types for the chat lifecycle core.

use parlor_core::error::ParlorError;
use parlor_core::types::MessageStatus;

/// Errors from the chat engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("no active session")]
    NoActiveSession,
    #[error("message not found: {0}")]
    MessageNotFound(uuid::Uuid),
    #[error("context item not found: {0}")]
    ContextItemNotFound(uuid::Uuid),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: MessageStatus,
        to: MessageStatus,
    },
    #[error("upload of '{name}' failed: {reason}")]
    UploadFailed { name: String, reason: String },
    #[error("clipboard access denied")]
    ClipboardAccessDenied,
    #[error("interrupted before completion")]
    Interrupted,
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<ParlorError> for ChatError {
    fn from(err: ParlorError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}
