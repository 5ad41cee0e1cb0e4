//! Upload simulator: per-attachment progress with a per-message join barrier.
//!
//! No bytes move anywhere. Each attachment advances by a fixed step on a
//! fixed interval until it reaches 100. A message is released only when every
//! one of its attachments has reached 100. Attachments whose payload cannot
//! be uploaded fail on their first tick and abort all of their siblings.

use std::collections::HashMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use parlor_core::config::UploadConfig;
use parlor_core::types::FileOrigin;

use crate::error::ChatError;
use crate::types::{Attachment, IncomingFile};

#[derive(Debug)]
struct UploadEntry {
    message_id: Uuid,
    attachment: Attachment,
    percent: u8,
    failure: Option<ChatError>,
}

#[derive(Debug)]
struct MessageUploads {
    session_id: Uuid,
    token: CancellationToken,
    attachments: Vec<Uuid>,
}

/// What a single tick did to an attachment.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Progress advanced; schedule another tick after `next_in`.
    Progress {
        message_id: Uuid,
        percent: u8,
        next_in: Duration,
        token: CancellationToken,
    },
    /// The attachment reached 100. `released` is true once every sibling
    /// of the owning message has reached 100 as well.
    Completed {
        message_id: Uuid,
        attachment: Attachment,
        released: bool,
    },
    /// The attachment failed. Siblings were cancelled and purged.
    Failed {
        message_id: Uuid,
        attachment_id: Uuid,
        error: ChatError,
    },
    /// Unknown, already finished, or purged attachment.
    Stale,
}

/// Progress state for every in-flight attachment.
#[derive(Debug)]
pub struct UploadSimulator {
    step: u8,
    interval: Duration,
    max_bytes: usize,
    uploads: HashMap<Uuid, UploadEntry>,
    messages: HashMap<Uuid, MessageUploads>,
}

impl UploadSimulator {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            step: config.step(),
            interval: config.tick_interval(),
            max_bytes: config.max_attachment_bytes,
            uploads: HashMap::new(),
            messages: HashMap::new(),
        }
    }

    /// Seed progress at 0 for an attachment.
    ///
    /// All attachments of one message share `token`; cancelling it silences
    /// every pending tick for that message. Returns the delay before the
    /// first tick.
    pub fn begin_upload(
        &mut self,
        session_id: Uuid,
        message_id: Uuid,
        attachment: &Attachment,
        file: &IncomingFile,
        token: &CancellationToken,
    ) -> Duration {
        let failure = self.classify(file);
        if let Some(ref err) = failure {
            tracing::debug!(attachment = %attachment.name, error = %err, "Upload will fail");
        }

        self.uploads.insert(
            attachment.id,
            UploadEntry {
                message_id,
                attachment: attachment.clone(),
                percent: 0,
                failure,
            },
        );
        self.messages
            .entry(message_id)
            .or_insert_with(|| MessageUploads {
                session_id,
                token: token.clone(),
                attachments: Vec::new(),
            })
            .attachments
            .push(attachment.id);
        self.interval
    }

    fn classify(&self, file: &IncomingFile) -> Option<ChatError> {
        if file.data.is_empty() {
            if file.origin == FileOrigin::Clipboard {
                return Some(ChatError::ClipboardAccessDenied);
            }
            return Some(ChatError::UploadFailed {
                name: file.name.clone(),
                reason: "file is empty".to_string(),
            });
        }
        if file.data.len() > self.max_bytes {
            return Some(ChatError::UploadFailed {
                name: file.name.clone(),
                reason: format!(
                    "{} bytes exceeds limit of {} bytes",
                    file.data.len(),
                    self.max_bytes
                ),
            });
        }
        None
    }

    /// Advance one attachment by one step.
    pub fn tick(&mut self, attachment_id: Uuid) -> TickOutcome {
        let Some(entry) = self.uploads.get_mut(&attachment_id) else {
            return TickOutcome::Stale;
        };
        if entry.percent >= 100 {
            return TickOutcome::Stale;
        }
        let message_id = entry.message_id;

        if let Some(error) = entry.failure.take() {
            tracing::warn!(%message_id, %attachment_id, error = %error, "Upload failed");
            self.abort_message(message_id);
            return TickOutcome::Failed {
                message_id,
                attachment_id,
                error,
            };
        }

        entry.percent = entry.percent.saturating_add(self.step).min(100);
        let percent = entry.percent;

        if percent < 100 {
            let Some(group) = self.messages.get(&message_id) else {
                return TickOutcome::Stale;
            };
            return TickOutcome::Progress {
                message_id,
                percent,
                next_in: self.interval,
                token: group.token.clone(),
            };
        }

        let attachment = entry.attachment.clone();
        let released = self.all_complete(message_id);
        tracing::debug!(%message_id, attachment = %attachment.name, released, "Upload complete");
        TickOutcome::Completed {
            message_id,
            attachment,
            released,
        }
    }

    fn all_complete(&self, message_id: Uuid) -> bool {
        self.messages.get(&message_id).is_some_and(|group| {
            group
                .attachments
                .iter()
                .all(|id| self.uploads.get(id).is_some_and(|e| e.percent >= 100))
        })
    }

    /// Purge progress entries of a released message. Returns how many were removed.
    pub fn finish_message(&mut self, message_id: Uuid) -> usize {
        let Some(group) = self.messages.remove(&message_id) else {
            return 0;
        };
        for id in &group.attachments {
            self.uploads.remove(id);
        }
        group.attachments.len()
    }

    /// Cancel pending ticks of a message and purge its entries.
    pub fn abort_message(&mut self, message_id: Uuid) -> usize {
        if let Some(group) = self.messages.get(&message_id) {
            group.token.cancel();
        }
        self.finish_message(message_id)
    }

    /// Abort every message of a session. Returns the aborted message ids.
    pub fn abort_session(&mut self, session_id: Uuid) -> Vec<Uuid> {
        let ids: Vec<Uuid> = self
            .messages
            .iter()
            .filter(|(_, g)| g.session_id == session_id)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.abort_message(*id);
        }
        ids
    }

    #[cfg(test)]
    fn percent(&self, attachment_id: Uuid) -> Option<u8> {
        self.uploads.get(&attachment_id).map(|e| e.percent)
    }

    /// Progress map of one session's attachments.
    pub fn progress_for_session(&self, session_id: Uuid) -> HashMap<Uuid, u8> {
        self.messages
            .values()
            .filter(|g| g.session_id == session_id)
            .flat_map(|g| g.attachments.iter())
            .filter_map(|id| self.uploads.get(id).map(|e| (*id, e.percent)))
            .collect()
    }

    #[cfg(test)]
    fn is_uploading(&self, message_id: Uuid) -> bool {
        self.messages.contains_key(&message_id)
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.uploads.len()
    }
}
