//! Session registry: the set of chat sessions and which one is active.

use chrono::Utc;
use uuid::Uuid;

use crate::error::ChatError;
use crate::types::{Extension, Session};

const FARM_GREETING: &str = "Hello! I'm your farm assistant. Ask me about crops, soil health, \
or anything you're noticing in the field.";
const PERSONAL_GREETING: &str =
    "Hi there! I'm your personal assistant. What can I help you organize today?";
const BANK_GREETING: &str = "Welcome! I'm your banking assistant. Ask me about accounts, \
transactions, or budgeting.";
const GENERIC_GREETING: &str = "Hello! How can I help you today?";

/// Canned welcome message for a session's extension.
pub fn welcome_message(extension: Option<&Extension>) -> &'static str {
    match extension {
        Some(Extension::Farm) => FARM_GREETING,
        Some(Extension::Personal) => PERSONAL_GREETING,
        Some(Extension::Bank) => BANK_GREETING,
        Some(Extension::Other(_)) | None => GENERIC_GREETING,
    }
}

/// Owns all sessions in creation order plus the active pointer.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
    active: Option<Uuid>,
    created: usize,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session, append it and make it active.
    pub fn create(&mut self, extension: Option<Extension>, model: &str) -> Session {
        self.created += 1;
        let name = match &extension {
            Some(Extension::Farm) => "Farm Assistant".to_string(),
            Some(Extension::Personal) => "Personal Assistant".to_string(),
            Some(Extension::Bank) => "Bank Assistant".to_string(),
            Some(Extension::Other(_)) | None => format!("Chat {}", self.created),
        };
        let session = Session {
            id: Uuid::new_v4(),
            name,
            model: model.to_string(),
            path: extension.as_ref().map(|ext| format!("/chat/{}", ext)),
            extension,
            created_at: Utc::now(),
        };
        self.sessions.push(session.clone());
        self.active = Some(session.id);
        session
    }

    /// Make `id` the active session. Unknown ids leave the registry unchanged.
    pub fn switch(&mut self, id: Uuid) -> Result<Session, ChatError> {
        let session = self.get(id).cloned().ok_or(ChatError::SessionNotFound(id))?;
        self.active = Some(id);
        Ok(session)
    }

    /// Remove a session. Clears the active pointer if it pointed at `id`.
    pub fn close(&mut self, id: Uuid) -> Result<Session, ChatError> {
        let pos = self
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or(ChatError::SessionNotFound(id))?;
        let removed = self.sessions.remove(pos);
        if self.active == Some(id) {
            self.active = None;
        }
        Ok(removed)
    }

    pub fn get(&self, id: Uuid) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    pub fn active(&self) -> Option<&Session> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn active_id(&self) -> Option<Uuid> {
        self.active
    }

    /// Most recently created session still registered.
    pub fn most_recent(&self) -> Option<&Session> {
        self.sessions.last()
    }

    /// All sessions in creation order.
    pub fn list(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sets_active() {
        let mut reg = SessionRegistry::new();
        let s = reg.create(None, "model-a");
        assert_eq!(reg.active_id(), Some(s.id));
        assert_eq!(reg.len(), 1);
        assert_eq!(s.model, "model-a");
        assert_eq!(s.name, "Chat 1");
        assert!(s.path.is_none());
    }

    #[test]
    fn test_create_extension_names_and_paths() {
        let mut reg = SessionRegistry::new();
        let farm = reg.create(Some(Extension::Farm), "m");
        assert_eq!(farm.name, "Farm Assistant");
        assert_eq!(farm.path.as_deref(), Some("/chat/farm"));

        let other = reg.create(Extension::parse("garden"), "m");
        assert_eq!(other.name, "Chat 2");
        assert_eq!(other.path.as_deref(), Some("/chat/garden"));
        assert_eq!(reg.active_id(), Some(other.id));
    }

    #[test]
    fn test_welcome_messages_are_distinct() {
        let farm = welcome_message(Some(&Extension::Farm));
        let personal = welcome_message(Some(&Extension::Personal));
        let bank = welcome_message(Some(&Extension::Bank));
        let generic = welcome_message(None);
        assert_ne!(farm, personal);
        assert_ne!(personal, bank);
        assert_ne!(bank, generic);
        assert!(farm.contains("farm"));
        assert_eq!(
            welcome_message(Some(&Extension::Other("garden".to_string()))),
            generic
        );
    }

    #[test]
    fn test_switch_existing() {
        let mut reg = SessionRegistry::new();
        let a = reg.create(None, "m");
        let _b = reg.create(None, "m");
        let switched = reg.switch(a.id).unwrap();
        assert_eq!(switched.id, a.id);
        assert_eq!(reg.active_id(), Some(a.id));
    }

    #[test]
    fn test_switch_unknown_leaves_state_unchanged() {
        let mut reg = SessionRegistry::new();
        let a = reg.create(None, "m");
        let missing = Uuid::new_v4();
        let err = reg.switch(missing).unwrap_err();
        assert_eq!(err, ChatError::SessionNotFound(missing));
        assert_eq!(reg.active_id(), Some(a.id));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_close_active_clears_pointer() {
        let mut reg = SessionRegistry::new();
        let a = reg.create(None, "m");
        let b = reg.create(None, "m");
        reg.close(b.id).unwrap();
        assert_eq!(reg.active_id(), None);
        assert_eq!(reg.most_recent().map(|s| s.id), Some(a.id));
    }

    #[test]
    fn test_close_inactive_keeps_pointer() {
        let mut reg = SessionRegistry::new();
        let a = reg.create(None, "m");
        let b = reg.create(None, "m");
        reg.close(a.id).unwrap();
        assert_eq!(reg.active_id(), Some(b.id));
        assert!(!reg.contains(a.id));
    }

    #[test]
    fn test_close_unknown() {
        let mut reg = SessionRegistry::new();
        assert!(matches!(
            reg.close(Uuid::new_v4()),
            Err(ChatError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_list_in_creation_order() {
        let mut reg = SessionRegistry::new();
        let ids: Vec<Uuid> = (0..3).map(|_| reg.create(None, "m").id).collect();
        let listed: Vec<Uuid> = reg.list().iter().map(|s| s.id).collect();
        assert_eq!(ids, listed);
    }
}
