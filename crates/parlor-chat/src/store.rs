//! Message store: append-only message sequences per session.
//!
//! Each session owns its own ordered list. Statuses change only through
//! [`MessageStore::transition`], which runs the status state machine.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use parlor_core::types::{MessageStatus, Sender};

use crate::error::ChatError;
use crate::status::{plan_transition, Transition};
use crate::types::{Artifact, Attachment, Message};

/// A status change that was actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub session_id: Uuid,
    pub message_id: Uuid,
    pub from: MessageStatus,
    pub to: MessageStatus,
}

/// In-memory message sequences keyed by session id.
#[derive(Debug, Default)]
pub struct MessageStore {
    sessions: HashMap<Uuid, Vec<Message>>,
    /// message id -> (session id, position in that session's list)
    index: HashMap<Uuid, (Uuid, usize)>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message in `Sending` state.
    pub fn append_user_message(
        &mut self,
        session_id: Uuid,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Message {
        self.append(
            session_id,
            content,
            Sender::User,
            MessageStatus::Sending,
            attachments,
            vec![],
            false,
        )
    }

    /// Append an assistant reply in `Sending` state, flagged as new.
    pub fn append_ai_message(
        &mut self,
        session_id: Uuid,
        content: &str,
        artifacts: Vec<Artifact>,
    ) -> Message {
        self.append(
            session_id,
            content,
            Sender::Ai,
            MessageStatus::Sending,
            vec![],
            artifacts,
            true,
        )
    }

    /// Append a session greeting, already delivered.
    pub fn append_welcome(&mut self, session_id: Uuid, content: &str) -> Message {
        self.append(
            session_id,
            content,
            Sender::Ai,
            MessageStatus::Delivered,
            vec![],
            vec![],
            false,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn append(
        &mut self,
        session_id: Uuid,
        content: &str,
        sender: Sender,
        status: MessageStatus,
        attachments: Vec<Attachment>,
        artifacts: Vec<Artifact>,
        is_new: bool,
    ) -> Message {
        let message = Message {
            id: Uuid::new_v4(),
            session_id,
            content: content.to_string(),
            sender,
            timestamp: Utc::now(),
            status,
            attachments,
            artifacts,
            is_new,
        };
        let list = self.sessions.entry(session_id).or_default();
        self.index.insert(message.id, (session_id, list.len()));
        list.push(message.clone());
        message
    }

    /// Move a message to `to`.
    ///
    /// Returns `Ok(None)` when the message already sits in that terminal
    /// state, and an error for any backward or out-of-terminal move.
    pub fn transition(
        &mut self,
        message_id: Uuid,
        to: MessageStatus,
    ) -> Result<Option<StatusUpdate>, ChatError> {
        let message = self
            .get_mut(message_id)
            .ok_or(ChatError::MessageNotFound(message_id))?;
        let from = message.status;
        match plan_transition(from, to)? {
            Transition::Unchanged => Ok(None),
            Transition::Apply => {
                message.status = to;
                tracing::debug!(%message_id, %from, %to, "Message status changed");
                Ok(Some(StatusUpdate {
                    session_id: message.session_id,
                    message_id,
                    from,
                    to,
                }))
            }
        }
    }

    pub fn mark_sent(&mut self, message_id: Uuid) -> Result<Option<StatusUpdate>, ChatError> {
        self.transition(message_id, MessageStatus::Sent)
    }

    pub fn mark_delivered(&mut self, message_id: Uuid) -> Result<Option<StatusUpdate>, ChatError> {
        self.transition(message_id, MessageStatus::Delivered)
    }

    pub fn mark_error(&mut self, message_id: Uuid) -> Result<Option<StatusUpdate>, ChatError> {
        self.transition(message_id, MessageStatus::Error)
    }

    /// Clear `is_new` on every message of a session. Returns how many changed.
    pub fn mark_seen(&mut self, session_id: Uuid) -> usize {
        let Some(list) = self.sessions.get_mut(&session_id) else {
            return 0;
        };
        let mut cleared = 0;
        for message in list.iter_mut().filter(|m| m.is_new) {
            message.is_new = false;
            cleared += 1;
        }
        cleared
    }

    /// Messages of a session in append order.
    pub fn messages(&self, session_id: Uuid) -> &[Message] {
        self.sessions
            .get(&session_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Messages of a session still awaiting an outcome, in append order.
    pub fn pending(&self, session_id: Uuid) -> Vec<&Message> {
        self.messages(session_id)
            .iter()
            .filter(|m| m.status.is_pending())
            .collect()
    }

    pub fn get(&self, message_id: Uuid) -> Option<&Message> {
        let (session_id, pos) = self.index.get(&message_id)?;
        self.sessions.get(session_id)?.get(*pos)
    }

    fn get_mut(&mut self, message_id: Uuid) -> Option<&mut Message> {
        let (session_id, pos) = self.index.get(&message_id)?;
        self.sessions.get_mut(session_id)?.get_mut(*pos)
    }

    /// Drop a session's whole history. Returns the number of messages removed.
    pub fn drop_session(&mut self, session_id: Uuid) -> usize {
        let Some(list) = self.sessions.remove(&session_id) else {
            return 0;
        };
        for message in &list {
            self.index.remove(&message.id);
        }
        list.len()
    }

    /// Total number of messages across all sessions.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: &str) -> Attachment {
        Attachment {
            id: Uuid::new_v4(),
            name: name.to_string(),
            mime_type: "image/png".to_string(),
            url: format!("blob:test/{}", name),
        }
    }

    #[test]
    fn test_append_user_message_is_sending() {
        let mut store = MessageStore::new();
        let sid = Uuid::new_v4();
        let msg = store.append_user_message(sid, "hello", vec![attachment("a.png")]);
        assert_eq!(msg.status, MessageStatus::Sending);
        assert_eq!(msg.sender, Sender::User);
        assert_eq!(msg.attachments.len(), 1);
        assert!(!msg.is_new);
        assert_eq!(store.messages(sid).len(), 1);
    }

    #[test]
    fn test_append_ai_message_is_new_and_sending() {
        let mut store = MessageStore::new();
        let sid = Uuid::new_v4();
        let msg = store.append_ai_message(sid, "reply", vec![]);
        assert_eq!(msg.status, MessageStatus::Sending);
        assert_eq!(msg.sender, Sender::Ai);
        assert!(msg.is_new);
    }

    #[test]
    fn test_welcome_is_delivered() {
        let mut store = MessageStore::new();
        let sid = Uuid::new_v4();
        let msg = store.append_welcome(sid, "hi");
        assert_eq!(msg.status, MessageStatus::Delivered);
        assert!(store.pending(sid).is_empty());
    }

    #[test]
    fn test_strict_append_order() {
        let mut store = MessageStore::new();
        let sid = Uuid::new_v4();
        for i in 0..10 {
            store.append_user_message(sid, &format!("m{}", i), vec![]);
        }
        let contents: Vec<&str> = store
            .messages(sid)
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("m{}", i)).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let mut store = MessageStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.append_user_message(a, "for a", vec![]);
        store.append_user_message(b, "for b", vec![]);
        store.append_user_message(b, "also b", vec![]);
        assert_eq!(store.messages(a).len(), 1);
        assert_eq!(store.messages(b).len(), 2);
        assert!(store.messages(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_mark_delivered() {
        let mut store = MessageStore::new();
        let sid = Uuid::new_v4();
        let id = store.append_user_message(sid, "x", vec![]).id;
        let update = store.mark_delivered(id).unwrap().unwrap();
        assert_eq!(update.from, MessageStatus::Sending);
        assert_eq!(update.to, MessageStatus::Delivered);
        assert_eq!(update.session_id, sid);
        assert_eq!(store.get(id).unwrap().status, MessageStatus::Delivered);
    }

    #[test]
    fn test_terminal_reaffirm_is_idempotent() {
        let mut store = MessageStore::new();
        let id = store.append_user_message(Uuid::new_v4(), "x", vec![]).id;
        store.mark_error(id).unwrap();
        assert_eq!(store.mark_error(id).unwrap(), None);
        assert_eq!(store.get(id).unwrap().status, MessageStatus::Error);
    }

    #[test]
    fn test_terminal_status_never_regresses() {
        let mut store = MessageStore::new();
        let id = store.append_user_message(Uuid::new_v4(), "x", vec![]).id;
        store.mark_delivered(id).unwrap();
        assert!(store.mark_error(id).is_err());
        assert!(store.mark_sent(id).is_err());
        assert!(store.transition(id, MessageStatus::Sending).is_err());
        assert_eq!(store.get(id).unwrap().status, MessageStatus::Delivered);
    }

    #[test]
    fn test_sent_then_delivered() {
        let mut store = MessageStore::new();
        let sid = Uuid::new_v4();
        let id = store.append_user_message(sid, "x", vec![]).id;
        store.mark_sent(id).unwrap();
        assert_eq!(store.pending(sid).len(), 1);
        store.mark_delivered(id).unwrap();
        assert!(store.pending(sid).is_empty());
    }

    #[test]
    fn test_transition_unknown_message() {
        let mut store = MessageStore::new();
        let missing = Uuid::new_v4();
        assert_eq!(
            store.mark_delivered(missing).unwrap_err(),
            ChatError::MessageNotFound(missing)
        );
    }

    #[test]
    fn test_mark_seen_clears_new_flags() {
        let mut store = MessageStore::new();
        let sid = Uuid::new_v4();
        store.append_ai_message(sid, "one", vec![]);
        store.append_ai_message(sid, "two", vec![]);
        store.append_user_message(sid, "three", vec![]);
        assert_eq!(store.mark_seen(sid), 2);
        assert!(store.messages(sid).iter().all(|m| !m.is_new));
        assert_eq!(store.mark_seen(sid), 0);
    }

    #[test]
    fn test_drop_session() {
        let mut store = MessageStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let id = store.append_user_message(a, "x", vec![]).id;
        store.append_user_message(a, "y", vec![]);
        store.append_user_message(b, "z", vec![]);
        assert_eq!(store.drop_session(a), 2);
        assert!(store.get(id).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.drop_session(a), 0);
    }
}
