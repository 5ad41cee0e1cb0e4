use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Who authored a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Ai => write!(f, "ai"),
        }
    }
}

/// Delivery status of a chat message.
///
/// Statuses only move forward: `Sending -> Sent -> Delivered`, with `Error`
/// reachable from either non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Accepted locally; attachments may still be uploading.
    Sending,
    /// Left the client but not yet acknowledged (queued while offline).
    Sent,
    /// Fully delivered.
    Delivered,
    /// Failed; no further transitions.
    Error,
}

impl MessageStatus {
    /// Returns true for `Delivered` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Delivered | MessageStatus::Error)
    }

    /// Returns true while the message still awaits an outcome.
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Sending => write!(f, "sending"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Delivered => write!(f, "delivered"),
            MessageStatus::Error => write!(f, "error"),
        }
    }
}

/// Connection state reported by the host environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Connected,
    Connecting,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Kind of item held in a context pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextItemType {
    Image,
    Document,
}

impl ContextItemType {
    /// Classify a MIME type: `image/*` is an image, everything else a document.
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.trim().to_ascii_lowercase().starts_with("image/") {
            ContextItemType::Image
        } else {
            ContextItemType::Document
        }
    }
}

impl fmt::Display for ContextItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextItemType::Image => write!(f, "image"),
            ContextItemType::Document => write!(f, "document"),
        }
    }
}

/// Where the host acquired an attachment from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOrigin {
    #[default]
    Picker,
    Clipboard,
    Camera,
}

/// Severity of an advisory notice surfaced to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!MessageStatus::Sending.is_terminal());
        assert!(!MessageStatus::Sent.is_terminal());
        assert!(MessageStatus::Delivered.is_terminal());
        assert!(MessageStatus::Error.is_terminal());
        assert!(MessageStatus::Sent.is_pending());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&MessageStatus::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");
        let parsed: MessageStatus = serde_json::from_str("\"sending\"").unwrap();
        assert_eq!(parsed, MessageStatus::Sending);
    }

    #[test]
    fn test_display_matches_serde_names() {
        assert_eq!(Sender::Ai.to_string(), "ai");
        assert_eq!(MessageStatus::Error.to_string(), "error");
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(ContextItemType::Document.to_string(), "document");
    }

    #[test]
    fn test_context_type_from_mime() {
        assert_eq!(ContextItemType::from_mime("image/png"), ContextItemType::Image);
        assert_eq!(ContextItemType::from_mime("IMAGE/JPEG"), ContextItemType::Image);
        assert_eq!(
            ContextItemType::from_mime("application/pdf"),
            ContextItemType::Document
        );
        assert_eq!(ContextItemType::from_mime(""), ContextItemType::Document);
    }

    #[test]
    fn test_connection_default_is_connected() {
        assert!(ConnectionStatus::default().is_connected());
        assert!(!ConnectionStatus::Connecting.is_connected());
    }
}
