//! Virtual clock with a cancellable timer queue.
//!
//! Every artificial delay in the chat pipeline (upload ticks, the typing
//! delay, the reply settle delay) is a [`Job`] scheduled here. Time only
//! moves when the owner advances it, so tests step through the pipeline
//! deterministically and the real-time driver simply feeds it elapsed time.
//!
//! Each timer carries a `CancellationToken`. A timer whose token has been
//! cancelled is dropped without firing when it comes due.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Work to run when a timer comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Advance one attachment's upload progress.
    UploadTick {
        session_id: Uuid,
        message_id: Uuid,
        attachment_id: Uuid,
    },
    /// The typing delay elapsed; append the reply to `reply_to`.
    AiReply { session_id: Uuid, reply_to: Uuid },
    /// The settle delay elapsed; mark the reply delivered.
    AiSettle { session_id: Uuid, message_id: Uuid },
}

#[derive(Debug)]
struct Timer {
    token: CancellationToken,
    job: Job,
}

/// Deterministic clock. Timers due at the same instant fire in scheduling order.
#[derive(Debug, Default)]
pub struct SimClock {
    now: Duration,
    seq: u64,
    timers: BTreeMap<(Duration, u64), Timer>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since the clock was created.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `job` to run `delay` from now. Returns the due time.
    pub fn schedule(&mut self, delay: Duration, token: &CancellationToken, job: Job) -> Duration {
        let due = self.now.saturating_add(delay);
        self.seq += 1;
        self.timers.insert(
            (due, self.seq),
            Timer {
                token: token.clone(),
                job,
            },
        );
        due
    }

    /// Pop the next live job due at or before `until`, moving `now` to its
    /// due time. Cancelled timers met on the way are discarded.
    pub fn next_due(&mut self, until: Duration) -> Option<Job> {
        loop {
            let (&(due, _), _) = self.timers.first_key_value()?;
            if due > until {
                return None;
            }
            let (_, timer) = self.timers.pop_first()?;
            self.now = self.now.max(due);
            if timer.token.is_cancelled() {
                tracing::trace!(job = ?timer.job, "Dropping cancelled timer");
                continue;
            }
            return Some(timer.job);
        }
    }

    /// Move `now` forward to `until` (never backwards).
    pub fn advance_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    /// Number of timers that would still fire.
    pub fn pending(&self) -> usize {
        self.timers
            .values()
            .filter(|t| !t.token.is_cancelled())
            .count()
    }

    /// Due time of the earliest live timer.
    #[cfg(test)]
    fn next_deadline(&self) -> Option<Duration> {
        self.timers
            .iter()
            .find(|(_, t)| !t.token.is_cancelled())
            .map(|(&(due, _), _)| due)
    }

    /// Drop all cancelled timers eagerly. Returns how many were removed.
    pub fn purge_cancelled(&mut self) -> usize {
        let before = self.timers.len();
        self.timers.retain(|_, t| !t.token.is_cancelled());
        before - self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(id: Uuid) -> Job {
        Job::AiSettle {
            session_id: Uuid::nil(),
            message_id: id,
        }
    }

    #[test]
    fn test_nothing_due_before_deadline() {
        let mut clock = SimClock::new();
        let token = CancellationToken::new();
        clock.schedule(Duration::from_millis(300), &token, settle(Uuid::new_v4()));
        assert!(clock.next_due(Duration::from_millis(299)).is_none());
        assert_eq!(clock.pending(), 1);
    }

    #[test]
    fn test_due_job_moves_now() {
        let mut clock = SimClock::new();
        let token = CancellationToken::new();
        let id = Uuid::new_v4();
        clock.schedule(Duration::from_millis(300), &token, settle(id));
        assert_eq!(clock.next_due(Duration::from_secs(1)), Some(settle(id)));
        assert_eq!(clock.now(), Duration::from_millis(300));
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_jobs_fire_in_time_then_fifo_order() {
        let mut clock = SimClock::new();
        let token = CancellationToken::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        clock.schedule(Duration::from_millis(200), &token, settle(a));
        clock.schedule(Duration::from_millis(100), &token, settle(b));
        clock.schedule(Duration::from_millis(200), &token, settle(c));

        let until = Duration::from_secs(1);
        assert_eq!(clock.next_due(until), Some(settle(b)));
        assert_eq!(clock.next_due(until), Some(settle(a)));
        assert_eq!(clock.next_due(until), Some(settle(c)));
        assert_eq!(clock.next_due(until), None);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut clock = SimClock::new();
        let session = CancellationToken::new();
        let message = session.child_token();
        let live = Uuid::new_v4();
        clock.schedule(Duration::from_millis(100), &message, settle(Uuid::new_v4()));
        clock.schedule(Duration::from_millis(200), &session, settle(live));

        message.cancel();
        assert_eq!(clock.pending(), 1);
        assert_eq!(clock.next_due(Duration::from_secs(1)), Some(settle(live)));
    }

    #[test]
    fn test_parent_cancel_reaches_child_timers() {
        let mut clock = SimClock::new();
        let session = CancellationToken::new();
        let child = session.child_token();
        clock.schedule(Duration::from_millis(100), &child, settle(Uuid::new_v4()));
        session.cancel();
        assert_eq!(clock.pending(), 0);
        assert!(clock.next_due(Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_purge_cancelled() {
        let mut clock = SimClock::new();
        let dead = CancellationToken::new();
        let live = CancellationToken::new();
        clock.schedule(Duration::from_millis(1), &dead, settle(Uuid::new_v4()));
        clock.schedule(Duration::from_millis(2), &dead, settle(Uuid::new_v4()));
        clock.schedule(Duration::from_millis(3), &live, settle(Uuid::new_v4()));
        dead.cancel();
        assert_eq!(clock.purge_cancelled(), 2);
        assert_eq!(clock.next_deadline(), Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_advance_to_never_goes_back() {
        let mut clock = SimClock::new();
        clock.advance_to(Duration::from_secs(2));
        clock.advance_to(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_schedule_is_relative_to_now() {
        let mut clock = SimClock::new();
        let token = CancellationToken::new();
        clock.advance_to(Duration::from_secs(5));
        let due = clock.schedule(Duration::from_millis(300), &token, settle(Uuid::new_v4()));
        assert_eq!(due, Duration::from_millis(5300));
    }

    #[test]
    fn test_schedule_saturates_at_end_of_time() {
        let mut clock = SimClock::new();
        let token = CancellationToken::new();
        clock.advance_to(Duration::MAX);
        let due = clock.schedule(Duration::from_millis(500), &token, settle(Uuid::new_v4()));
        assert_eq!(due, Duration::MAX);
        assert!(clock.next_due(Duration::MAX).is_some());
    }
}
