//! Domain types for chat sessions, messages, attachments and context items.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parlor_core::types::{ContextItemType, FileOrigin, MessageStatus, Sender};

// =============================================================================
// Sessions
// =============================================================================

/// Assistant flavor a session was created for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Extension {
    Farm,
    Personal,
    Bank,
    /// Any extension without a dedicated greeting.
    Other(String),
}

impl Extension {
    /// Parse a raw extension label. Blank input means "no extension".
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return None;
        }
        Some(Self::from(normalized))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Extension::Farm => "farm",
            Extension::Personal => "personal",
            Extension::Bank => "bank",
            Extension::Other(s) => s,
        }
    }
}

impl From<String> for Extension {
    fn from(value: String) -> Self {
        match value.as_str() {
            "farm" => Extension::Farm,
            "personal" => Extension::Personal,
            "bank" => Extension::Bank,
            _ => Extension::Other(value),
        }
    }
}

impl From<Extension> for String {
    fn from(value: Extension) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independent conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub model: String,
    pub extension: Option<Extension>,
    pub path: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Messages
// =============================================================================

/// A file attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    /// Object-URL style handle. The host owns its lifetime.
    pub url: String,
}

impl Attachment {
    /// Mint an attachment for an incoming file under the given URL origin.
    pub fn from_file(file: &IncomingFile, url_origin: &str) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            url: format!("blob:{}/{}", url_origin, id),
        }
    }

    pub fn context_type(&self) -> ContextItemType {
        ContextItemType::from_mime(&self.mime_type)
    }
}

/// Kind of structured payload carried by an AI message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Table,
    Chart,
    Image,
}

/// A renderable payload attached to an AI message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub kind: ArtifactKind,
    pub title: String,
    pub payload: serde_json::Value,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, title: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            payload,
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    /// Set on fresh AI replies until the view acknowledges them.
    #[serde(default)]
    pub is_new: bool,
}

// =============================================================================
// Inputs
// =============================================================================

/// A file already materialized by the host (picker, clipboard, camera).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub origin: FileOrigin,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
            origin: FileOrigin::Picker,
        }
    }

    pub fn with_origin(mut self, origin: FileOrigin) -> Self {
        self.origin = origin;
        self
    }
}

// =============================================================================
// Context
// =============================================================================

/// An attachment-derived item made available as conversational context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: Uuid,
    pub url: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ContextItemType,
    pub added_at: DateTime<Utc>,
}

/// Result of adding an item to a context pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextAddOutcome {
    /// A new item was appended.
    Added(ContextItem),
    /// The URL was already present; carries the existing item.
    Duplicate(ContextItem),
}

impl ContextAddOutcome {
    pub fn item(&self) -> &ContextItem {
        match self {
            ContextAddOutcome::Added(item) | ContextAddOutcome::Duplicate(item) => item,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, ContextAddOutcome::Duplicate(_))
    }
}
