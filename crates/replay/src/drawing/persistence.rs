//! Pending annotation writes.
//!
//! A single slot holds the newest unsaved snapshot. It is flushed by a
//! debounce deadline, by an explicit commit, or on teardown; all three end in
//! the same upsert.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct PendingWrite<T> {
    pending: Option<T>,
    deadline: Option<Instant>,
    last_persisted: Option<T>,
    debounce: Duration,
}

impl<T: Clone + PartialEq> PendingWrite<T> {
    /// `persisted` is the state already in the store.
    pub fn new(persisted: T, debounce: Duration) -> Self {
        Self {
            pending: None,
            deadline: None,
            last_persisted: Some(persisted),
            debounce,
        }
    }

    /// Queue `state` and push the deadline out by the debounce interval.
    pub fn schedule(&mut self, state: T) {
        self.pending = Some(state);
        self.deadline = Some(Instant::now() + self.debounce);
    }

    /// Queue `state` for an immediate write.
    pub fn commit(&mut self, state: T) {
        self.pending = Some(state);
        self.deadline = Some(Instant::now());
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending state if its deadline has passed.
    ///
    /// Returns `None` when nothing is due or the state matches the last
    /// persisted snapshot.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if deadline <= now => self.take(),
            _ => None,
        }
    }

    /// Take whatever is unsaved, ignoring the deadline.
    ///
    /// `current` is compared against the last persisted snapshot so edits
    /// that never armed a write are flushed too.
    pub fn take_for_teardown(&mut self, current: &T) -> Option<T> {
        self.pending = None;
        self.deadline = None;
        if self.last_persisted.as_ref() == Some(current) {
            None
        } else {
            Some(current.clone())
        }
    }

    /// Record a successful write.
    pub fn mark_persisted(&mut self, state: T) {
        self.last_persisted = Some(state);
    }

    fn take(&mut self) -> Option<T> {
        self.deadline = None;
        let state = self.pending.take()?;
        if self.last_persisted.as_ref() == Some(&state) {
            None
        } else {
            Some(state)
        }
    }
}
