//! Chat orchestrator: composition root of the session and message lifecycle.
//!
//! Owns the registry, message store, context pools, upload simulator and the
//! virtual clock behind one mutex, so every write is serialized. Components
//! never call each other; all cross-component flow happens here. Events are
//! collected while the lock is held and published after it is released.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use parlor_core::config::ChatConfig;
use parlor_core::events::ChatEvent;
use parlor_core::types::{ConnectionStatus, ContextItemType, MessageStatus, Sender};

use crate::clock::{Job, SimClock};
use crate::context::ContextPool;
use crate::error::ChatError;
use crate::registry::{welcome_message, SessionRegistry};
use crate::response::{ResponseGenerator, ResponseSource};
use crate::store::{MessageStore, StatusUpdate};
use crate::types::{
    Attachment, ContextAddOutcome, ContextItem, Extension, IncomingFile, Message, Session,
};
use crate::upload::{TickOutcome, UploadSimulator};

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// A user message held at `Sent` until the connection returns.
#[derive(Debug, Clone, Copy)]
struct QueuedSend {
    session_id: Uuid,
    message_id: Uuid,
}

struct ChatState {
    config: ChatConfig,
    registry: SessionRegistry,
    store: MessageStore,
    pools: HashMap<Uuid, ContextPool>,
    uploads: UploadSimulator,
    clock: SimClock,
    /// Live cancellation token per session. Absent for sessions left behind.
    tokens: HashMap<Uuid, CancellationToken>,
    /// Outstanding replies per session; typing while non-zero.
    typing: HashMap<Uuid, usize>,
    connection: ConnectionStatus,
    queued: VecDeque<QueuedSend>,
    outbox: Vec<ChatEvent>,
}

impl ChatState {
    fn new(config: ChatConfig) -> Self {
        let uploads = UploadSimulator::new(&config.upload);
        Self {
            config,
            registry: SessionRegistry::new(),
            store: MessageStore::new(),
            pools: HashMap::new(),
            uploads,
            clock: SimClock::new(),
            tokens: HashMap::new(),
            typing: HashMap::new(),
            connection: ConnectionStatus::default(),
            queued: VecDeque::new(),
            outbox: Vec::new(),
        }
    }

    fn emit(&mut self, event: ChatEvent) {
        self.outbox.push(event);
    }

    fn emit_update(&mut self, update: Option<StatusUpdate>) {
        if let Some(u) = update {
            self.emit(ChatEvent::MessageStatusChanged {
                session_id: u.session_id,
                message_id: u.message_id,
                from: u.from,
                to: u.to,
            });
        }
    }

    fn emit_appended(&mut self, message: &Message) {
        self.emit(ChatEvent::MessageAppended {
            session_id: message.session_id,
            message_id: message.id,
            sender: message.sender,
            status: message.status,
        });
    }

    fn active_id(&self) -> Result<Uuid, ChatError> {
        self.registry.active_id().ok_or(ChatError::NoActiveSession)
    }

    fn session_token(&mut self, session_id: Uuid) -> CancellationToken {
        self.tokens
            .entry(session_id)
            .or_insert_with(CancellationToken::new)
            .clone()
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    fn open_session(&mut self, extension: Option<Extension>) -> Session {
        let session = self.registry.create(extension, &self.config.default_model);
        self.tokens.insert(session.id, CancellationToken::new());
        self.pools.insert(session.id, ContextPool::new());

        self.emit(ChatEvent::SessionCreated {
            session_id: session.id,
            name: session.name.clone(),
            extension: session.extension.as_ref().map(|e| e.to_string()),
        });
        let welcome = self
            .store
            .append_welcome(session.id, welcome_message(session.extension.as_ref()));
        self.emit_appended(&welcome);

        tracing::info!(session_id = %session.id, name = %session.name, "Chat session created");
        session
    }

    /// Cancel a session's in-flight work and settle whatever it left behind.
    fn leave_session(&mut self, session_id: Uuid) {
        if let Some(token) = self.tokens.remove(&session_id) {
            token.cancel();
        }
        let aborted = self.uploads.abort_session(session_id).len();

        let pending: Vec<(Uuid, Sender)> = self
            .store
            .pending(session_id)
            .iter()
            .map(|m| (m.id, m.sender))
            .collect();
        for &(message_id, sender) in &pending {
            // A reply's content is already final; a user message never reached the peer.
            let target = match sender {
                Sender::User => MessageStatus::Error,
                Sender::Ai => MessageStatus::Delivered,
            };
            match self.store.transition(message_id, target) {
                Ok(update) => self.emit_update(update),
                Err(e) => tracing::warn!(%message_id, error = %e, "Failed to settle message"),
            }
        }

        let interrupted = pending.iter().filter(|(_, s)| *s == Sender::User).count();
        if interrupted > 0 {
            let reason = ChatError::Interrupted;
            tracing::warn!(%session_id, interrupted, error = %reason, "Unsent messages dropped");
            self.emit(ChatEvent::warning(format!(
                "{} unsent message(s) {}.",
                interrupted, reason
            )));
        }

        if self.typing.remove(&session_id).is_some() {
            self.emit(ChatEvent::AiTypingChanged {
                session_id,
                typing: false,
            });
        }
        self.queued.retain(|q| q.session_id != session_id);
        let purged = self.clock.purge_cancelled();

        if !pending.is_empty() || purged > 0 {
            tracing::debug!(
                %session_id,
                settled = pending.len(),
                aborted_uploads = aborted,
                purged_timers = purged,
                "Interrupted session work"
            );
        }
    }

    fn switch_to(&mut self, id: Uuid) -> Result<Session, ChatError> {
        if !self.registry.contains(id) {
            tracing::warn!(session_id = %id, "Switch to unknown session ignored");
            self.emit(ChatEvent::warning("That chat session no longer exists."));
            return Err(ChatError::SessionNotFound(id));
        }

        let from = self.registry.active_id();
        if from == Some(id) {
            return self.registry.switch(id);
        }
        if let Some(prev) = from {
            self.leave_session(prev);
        }
        let session = self.registry.switch(id)?;
        self.session_token(id);
        self.emit(ChatEvent::SessionSwitched { from, to: id });
        tracing::info!(session_id = %id, "Switched chat session");
        Ok(session)
    }

    fn close(&mut self, id: Uuid) -> Result<Session, ChatError> {
        if !self.registry.contains(id) {
            return Err(ChatError::SessionNotFound(id));
        }
        let was_active = self.registry.active_id() == Some(id);

        self.leave_session(id);
        let dropped = self.store.drop_session(id);
        self.pools.remove(&id);
        let session = self.registry.close(id)?;
        self.emit(ChatEvent::SessionClosed { session_id: id });
        tracing::info!(session_id = %id, messages = dropped, "Chat session closed");

        if was_active {
            match self.registry.most_recent().map(|s| s.id) {
                Some(next) => {
                    self.registry.switch(next)?;
                    self.session_token(next);
                    self.emit(ChatEvent::SessionSwitched {
                        from: None,
                        to: next,
                    });
                }
                None => {
                    let fresh = self.open_session(None);
                    self.emit(ChatEvent::SessionSwitched {
                        from: None,
                        to: fresh.id,
                    });
                }
            }
        }
        Ok(session)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    fn send(&mut self, content: &str, files: Vec<IncomingFile>) -> Result<Uuid, ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }
        let text = content.trim();
        if text.is_empty() && files.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let max = self.config.max_message_length;
        if text.chars().count() > max {
            return Err(ChatError::MessageTooLong(max));
        }
        let session_id = self.active_id()?;
        let token = self.session_token(session_id);

        let attachments: Vec<Attachment> = files
            .iter()
            .map(|f| Attachment::from_file(f, &self.config.url_origin))
            .collect();
        let message = self
            .store
            .append_user_message(session_id, text, attachments.clone());
        let message_id = message.id;
        self.emit_appended(&message);
        tracing::info!(
            %session_id,
            %message_id,
            attachments = attachments.len(),
            "Message accepted"
        );

        if attachments.is_empty() {
            self.release(session_id, message_id)?;
            return Ok(message_id);
        }

        let upload_token = token.child_token();
        for (attachment, file) in attachments.iter().zip(&files) {
            let delay =
                self.uploads
                    .begin_upload(session_id, message_id, attachment, file, &upload_token);
            self.emit(ChatEvent::UploadProgressed {
                message_id,
                attachment_id: attachment.id,
                percent: 0,
            });
            self.clock.schedule(
                delay,
                &upload_token,
                Job::UploadTick {
                    session_id,
                    message_id,
                    attachment_id: attachment.id,
                },
            );
        }
        Ok(message_id)
    }

    /// Settle a user message whose uploads are done.
    fn release(&mut self, session_id: Uuid, message_id: Uuid) -> Result<(), ChatError> {
        if self.connection.is_connected() {
            let update = self.store.mark_delivered(message_id)?;
            self.emit_update(update);
            self.schedule_reply(session_id, message_id);
            return Ok(());
        }

        let update = self.store.mark_sent(message_id)?;
        self.emit_update(update);
        self.queued.push_back(QueuedSend {
            session_id,
            message_id,
        });
        tracing::info!(%message_id, connection = %self.connection, "Message queued offline");
        self.emit(ChatEvent::info(
            "You're offline. The message will be delivered when the connection returns.",
        ));
        Ok(())
    }

    fn schedule_reply(&mut self, session_id: Uuid, reply_to: Uuid) {
        let token = self.session_token(session_id);
        let delay = self.config.assistant.typing_delay();
        self.clock.schedule(
            delay,
            &token,
            Job::AiReply {
                session_id,
                reply_to,
            },
        );
        self.set_typing(session_id, true);
    }

    fn set_typing(&mut self, session_id: Uuid, started: bool) {
        let count = self.typing.entry(session_id).or_insert(0);
        let was = *count > 0;
        if started {
            *count += 1;
        } else {
            *count = count.saturating_sub(1);
        }
        let now = *count > 0;
        if !now {
            self.typing.remove(&session_id);
        }
        if was != now {
            self.emit(ChatEvent::AiTypingChanged {
                session_id,
                typing: now,
            });
        }
    }

    // =========================================================================
    // Context
    // =========================================================================

    fn register_context(
        &mut self,
        session_id: Uuid,
        url: &str,
        name: &str,
        item_type: ContextItemType,
    ) -> ContextAddOutcome {
        let outcome = self
            .pools
            .entry(session_id)
            .or_default()
            .add_item(url, name, item_type);
        match &outcome {
            ContextAddOutcome::Added(item) => self.emit(ChatEvent::ContextItemAdded {
                session_id,
                item_id: item.id,
                url: item.url.clone(),
                item_type: item.item_type,
            }),
            ContextAddOutcome::Duplicate(item) => {
                self.emit(ChatEvent::info(format!("'{}' is already in context.", item.name)))
            }
        }
        outcome
    }

    // =========================================================================
    // Timers
    // =========================================================================

    fn advance(&mut self, by: Duration, responder: &dyn ResponseSource) -> usize {
        let until = self.clock.now().saturating_add(by);
        let mut fired = 0;
        while let Some(job) = self.clock.next_due(until) {
            fired += 1;
            if let Err(e) = self.dispatch(job, responder) {
                tracing::warn!(?job, error = %e, "Timer job failed");
            }
        }
        self.clock.advance_to(until);
        fired
    }

    fn dispatch(&mut self, job: Job, responder: &dyn ResponseSource) -> Result<(), ChatError> {
        match job {
            Job::UploadTick {
                session_id,
                attachment_id,
                ..
            } => self.on_upload_tick(session_id, attachment_id),
            Job::AiReply {
                session_id,
                reply_to,
            } => self.on_reply_due(session_id, reply_to, responder),
            Job::AiSettle { message_id, .. } => {
                let update = self.store.mark_delivered(message_id)?;
                self.emit_update(update);
                Ok(())
            }
        }
    }

    fn on_upload_tick(&mut self, session_id: Uuid, attachment_id: Uuid) -> Result<(), ChatError> {
        match self.uploads.tick(attachment_id) {
            TickOutcome::Progress {
                message_id,
                percent,
                next_in,
                token,
            } => {
                self.emit(ChatEvent::UploadProgressed {
                    message_id,
                    attachment_id,
                    percent,
                });
                self.clock.schedule(
                    next_in,
                    &token,
                    Job::UploadTick {
                        session_id,
                        message_id,
                        attachment_id,
                    },
                );
            }
            TickOutcome::Completed {
                message_id,
                attachment,
                released,
            } => {
                self.emit(ChatEvent::UploadProgressed {
                    message_id,
                    attachment_id,
                    percent: 100,
                });
                self.register_context(
                    session_id,
                    &attachment.url,
                    &attachment.name,
                    attachment.context_type(),
                );
                if released {
                    self.uploads.finish_message(message_id);
                    self.release(session_id, message_id)?;
                }
            }
            TickOutcome::Failed {
                message_id,
                attachment_id,
                error,
            } => {
                self.emit(ChatEvent::UploadFailed {
                    message_id,
                    attachment_id,
                    reason: error.to_string(),
                });
                let update = self.store.mark_error(message_id)?;
                self.emit_update(update);
                self.emit(ChatEvent::warning(error.to_string()));
            }
            TickOutcome::Stale => {}
        }
        Ok(())
    }

    fn on_reply_due(
        &mut self,
        session_id: Uuid,
        reply_to: Uuid,
        responder: &dyn ResponseSource,
    ) -> Result<(), ChatError> {
        self.set_typing(session_id, false);
        let text = self
            .store
            .get(reply_to)
            .map(|m| m.content.clone())
            .ok_or(ChatError::MessageNotFound(reply_to))?;

        let reply = responder.respond(&text);
        let message = self
            .store
            .append_ai_message(session_id, &reply.content, reply.artifacts);
        self.emit_appended(&message);
        tracing::debug!(%session_id, message_id = %message.id, %reply_to, "Assistant replied");

        let token = self.session_token(session_id);
        let delay = self.config.assistant.settle_delay();
        self.clock.schedule(
            delay,
            &token,
            Job::AiSettle {
                session_id,
                message_id: message.id,
            },
        );
        Ok(())
    }

    // =========================================================================
    // Connection
    // =========================================================================

    fn set_connection(&mut self, status: ConnectionStatus) {
        let from = self.connection;
        if from == status {
            return;
        }
        self.connection = status;
        self.emit(ChatEvent::ConnectionStatusChanged { from, to: status });
        tracing::info!(%from, to = %status, "Connection status changed");

        if !status.is_connected() {
            if from.is_connected() {
                self.emit(ChatEvent::warning(
                    "Connection lost. New messages will be queued.",
                ));
            }
            return;
        }

        let queued: Vec<QueuedSend> = self.queued.drain(..).collect();
        let delivered = queued.len();
        for q in queued {
            match self.store.mark_delivered(q.message_id) {
                Ok(update) => {
                    self.emit_update(update);
                    self.schedule_reply(q.session_id, q.message_id);
                }
                Err(e) => tracing::warn!(
                    message_id = %q.message_id,
                    error = %e,
                    "Dropping queued message"
                ),
            }
        }
        if delivered > 0 {
            self.emit(ChatEvent::info(format!(
                "Back online. Delivered {} queued message(s).",
                delivered
            )));
        }
    }
}

// =============================================================================
// ChatOrchestrator
// =============================================================================

/// Central coordinator for chat sessions, messages, uploads and context.
///
/// Starts with one generic session already active. Nothing happens on its
/// own: timers fire only when [`ChatOrchestrator::advance`] moves the clock,
/// either from tests or from a [`crate::driver::ClockDriver`].
pub struct ChatOrchestrator {
    state: Mutex<ChatState>,
    responder: Box<dyn ResponseSource>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatOrchestrator {
    /// Create an orchestrator answering with the canned keyword responder.
    pub fn new(config: ChatConfig) -> Self {
        Self::with_responder(config, Box::new(ResponseGenerator::new()))
    }

    pub fn with_responder(config: ChatConfig, responder: Box<dyn ResponseSource>) -> Self {
        let mut state = ChatState::new(config);
        state.open_session(None);
        state.outbox.clear();

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(state),
            responder,
            events,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChatState>, ChatError> {
        self.state
            .lock()
            .map_err(|e| ChatError::StorageError(format!("chat state lock poisoned: {}", e)))
    }

    /// Run `f` under the lock, then publish whatever it emitted.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut ChatState) -> Result<T, ChatError>,
    ) -> Result<T, ChatError> {
        let mut state = self.lock()?;
        let result = f(&mut *state);
        let events = std::mem::take(&mut state.outbox);
        drop(state);

        for event in events {
            tracing::trace!(event = event.event_name(), "Publishing chat event");
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        result
    }

    /// Subscribe to state-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Send a message with optional attachments in the active session.
    ///
    /// Returns the new message id immediately. Uploads, delivery and the
    /// assistant reply progress as the clock advances.
    pub fn send_message(
        &self,
        content: &str,
        files: Vec<IncomingFile>,
    ) -> Result<Uuid, ChatError> {
        self.mutate(|state| state.send(content, files))
    }

    /// Leave the active session and open a new one with its welcome message.
    pub fn create_new_chat(&self, extension: Option<&str>) -> Result<Session, ChatError> {
        self.mutate(|state| {
            let from = state.registry.active_id();
            if let Some(prev) = from {
                state.leave_session(prev);
            }
            let session = state.open_session(extension.and_then(Extension::parse));
            state.emit(ChatEvent::SessionSwitched {
                from,
                to: session.id,
            });
            Ok(session)
        })
    }

    /// Make `id` the active session.
    ///
    /// An unknown id changes nothing, publishes a warning notice and returns
    /// [`ChatError::SessionNotFound`].
    pub fn switch_session(&self, id: Uuid) -> Result<Session, ChatError> {
        self.mutate(|state| state.switch_to(id))
    }

    /// Close a session and drop its history.
    ///
    /// Closing the active session activates the most recent remaining one,
    /// or a fresh generic session when none remain.
    pub fn close_session(&self, id: Uuid) -> Result<Session, ChatError> {
        self.mutate(|state| state.close(id))
    }

    /// Add an item to the active session's context pool.
    pub fn add_item_to_context(
        &self,
        url: &str,
        name: &str,
        item_type: ContextItemType,
    ) -> Result<ContextAddOutcome, ChatError> {
        self.mutate(|state| {
            let session_id = state.active_id()?;
            Ok(state.register_context(session_id, url, name, item_type))
        })
    }

    pub fn remove_context_item(&self, id: Uuid) -> Result<ContextItem, ChatError> {
        self.mutate(|state| {
            let session_id = state.active_id()?;
            let item = state
                .pools
                .get_mut(&session_id)
                .ok_or(ChatError::ContextItemNotFound(id))?
                .remove_item(id)?;
            state.emit(ChatEvent::ContextItemRemoved {
                session_id,
                item_id: id,
            });
            Ok(item)
        })
    }

    /// Empty the active session's context pool. Returns how many items were removed.
    pub fn clear_context(&self) -> Result<usize, ChatError> {
        self.mutate(|state| {
            let session_id = state.active_id()?;
            let removed = state
                .pools
                .get_mut(&session_id)
                .map(ContextPool::clear)
                .unwrap_or_default();
            for item in &removed {
                state.emit(ChatEvent::ContextItemRemoved {
                    session_id,
                    item_id: item.id,
                });
            }
            tracing::debug!(%session_id, removed = removed.len(), "Context cleared");
            Ok(removed.len())
        })
    }

    /// Report a host connection change. Reconnecting flushes queued sends in order.
    pub fn set_connection_status(&self, status: ConnectionStatus) -> Result<(), ChatError> {
        self.mutate(|state| {
            state.set_connection(status);
            Ok(())
        })
    }

    /// Clear the "new" flag on the active session's messages.
    pub fn mark_messages_seen(&self) -> Result<usize, ChatError> {
        self.mutate(|state| {
            let session_id = state.active_id()?;
            Ok(state.store.mark_seen(session_id))
        })
    }

    /// Move the virtual clock forward, running every timer that comes due.
    /// Returns the number of timers fired.
    pub fn advance(&self, by: Duration) -> Result<usize, ChatError> {
        let responder = &*self.responder;
        self.mutate(|state| Ok(state.advance(by, responder)))
    }

    // =========================================================================
    // Observable state
    // =========================================================================

    /// Messages of the active session in append order.
    pub fn messages(&self) -> Result<Vec<Message>, ChatError> {
        let state = self.lock()?;
        let session_id = state.active_id()?;
        Ok(state.store.messages(session_id).to_vec())
    }

    /// Messages of any registered session.
    pub fn history(&self, session_id: Uuid) -> Result<Vec<Message>, ChatError> {
        let state = self.lock()?;
        if !state.registry.contains(session_id) {
            return Err(ChatError::SessionNotFound(session_id));
        }
        Ok(state.store.messages(session_id).to_vec())
    }

    pub fn active_session(&self) -> Result<Session, ChatError> {
        let state = self.lock()?;
        state
            .registry
            .active()
            .cloned()
            .ok_or(ChatError::NoActiveSession)
    }

    /// All sessions in creation order.
    pub fn available_sessions(&self) -> Result<Vec<Session>, ChatError> {
        Ok(self.lock()?.registry.list().to_vec())
    }

    pub fn context_items(&self) -> Result<Vec<ContextItem>, ChatError> {
        let state = self.lock()?;
        let session_id = state.active_id()?;
        Ok(state
            .pools
            .get(&session_id)
            .map(|pool| pool.items().to_vec())
            .unwrap_or_default())
    }

    /// Upload progress of the active session's in-flight attachments.
    pub fn upload_progress(&self) -> Result<HashMap<Uuid, u8>, ChatError> {
        let state = self.lock()?;
        let session_id = state.active_id()?;
        Ok(state.uploads.progress_for_session(session_id))
    }

    pub fn is_ai_typing(&self) -> Result<bool, ChatError> {
        let state = self.lock()?;
        let session_id = state.active_id()?;
        Ok(state.typing.contains_key(&session_id))
    }

    pub fn connection_status(&self) -> Result<ConnectionStatus, ChatError> {
        Ok(self.lock()?.connection)
    }

    /// Current virtual time.
    pub fn now(&self) -> Result<Duration, ChatError> {
        Ok(self.lock()?.clock.now())
    }

    /// Timers that would still fire.
    pub fn pending_timers(&self) -> Result<usize, ChatError> {
        Ok(self.lock()?.clock.pending())
    }
}
