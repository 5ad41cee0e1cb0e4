use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ConnectionStatus, ContextItemType, MessageStatus, NoticeLevel, Sender};

/// All observable state changes of the chat core.
///
/// Events are published by the orchestrator after the state change has been
/// applied and are consumed by the presentation layer (or the CLI) to refresh
/// its view. Publishing never blocks and never fails the operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ChatEvent {
    // =========================================================================
    // Session Events
    // =========================================================================
    /// A session was created and made active.
    SessionCreated {
        session_id: Uuid,
        name: String,
        extension: Option<String>,
    },

    /// The active session changed.
    SessionSwitched { from: Option<Uuid>, to: Uuid },

    /// A session was closed and its history dropped.
    SessionClosed { session_id: Uuid },

    // =========================================================================
    // Message Events
    // =========================================================================
    /// A message was appended to a session's sequence.
    MessageAppended {
        session_id: Uuid,
        message_id: Uuid,
        sender: Sender,
        status: MessageStatus,
    },

    /// A message moved forward in its delivery lifecycle.
    MessageStatusChanged {
        session_id: Uuid,
        message_id: Uuid,
        from: MessageStatus,
        to: MessageStatus,
    },

    /// The assistant started or stopped "typing" in a session.
    AiTypingChanged { session_id: Uuid, typing: bool },

    // =========================================================================
    // Upload Events
    // =========================================================================
    /// An attachment's simulated upload advanced.
    UploadProgressed {
        message_id: Uuid,
        attachment_id: Uuid,
        percent: u8,
    },

    /// An attachment upload failed.
    UploadFailed {
        message_id: Uuid,
        attachment_id: Uuid,
        reason: String,
    },

    // =========================================================================
    // Context Events
    // =========================================================================
    /// An item entered a session's context pool.
    ContextItemAdded {
        session_id: Uuid,
        item_id: Uuid,
        url: String,
        item_type: ContextItemType,
    },

    /// An item left a session's context pool.
    ContextItemRemoved { session_id: Uuid, item_id: Uuid },

    // =========================================================================
    // Connection & Advisory Events
    // =========================================================================
    /// The host connection status changed.
    ConnectionStatusChanged {
        from: ConnectionStatus,
        to: ConnectionStatus,
    },

    /// Advisory notice meant for a toast or log line.
    Notice { level: NoticeLevel, text: String },
}

impl ChatEvent {
    /// Returns a stable event name for logging and serialization.
    pub fn event_name(&self) -> &'static str {
        match self {
            ChatEvent::SessionCreated { .. } => "session_created",
            ChatEvent::SessionSwitched { .. } => "session_switched",
            ChatEvent::SessionClosed { .. } => "session_closed",
            ChatEvent::MessageAppended { .. } => "message_appended",
            ChatEvent::MessageStatusChanged { .. } => "message_status_changed",
            ChatEvent::AiTypingChanged { .. } => "ai_typing_changed",
            ChatEvent::UploadProgressed { .. } => "upload_progressed",
            ChatEvent::UploadFailed { .. } => "upload_failed",
            ChatEvent::ContextItemAdded { .. } => "context_item_added",
            ChatEvent::ContextItemRemoved { .. } => "context_item_removed",
            ChatEvent::ConnectionStatusChanged { .. } => "connection_status_changed",
            ChatEvent::Notice { .. } => "notice",
        }
    }

    /// Build an informational notice.
    pub fn info(text: impl Into<String>) -> Self {
        ChatEvent::Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    /// Build a warning notice.
    pub fn warning(text: impl Into<String>) -> Self {
        ChatEvent::Notice {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }
}
