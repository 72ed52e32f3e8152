#![forbid(unsafe_code)]

//! Per-view change-handler queue.
//!
//! Field changes queue handler names; the tree drains the queue once per
//! tick. A name is queued at most once per cycle, and names queued while a
//! flush is running belong to the next cycle.
//!
//! ```text
//!          queue(n)              begin_flush()
//!   Idle ──────────► Queued ─────────────────► Flushing
//!    ▲                  ▲                         │
//!    │                  └──── end_flush() ────────┤ (names queued meanwhile)
//!    └─────────────────────── end_flush() ────────┘ (nothing queued)
//! ```

use std::rc::Rc;

use ahash::AHashSet;

/// Scheduling state of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Queued,
    Flushing,
}

/// Insertion-ordered, duplicate-suppressing set of handler names.
#[derive(Debug, Default)]
pub struct ChangeHandlerQueue {
    pending: Vec<Rc<str>>,
    seen: AHashSet<Rc<str>>,
    flushing: bool,
}

impl ChangeHandlerQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `name` unless it is already pending. Returns whether it was added.
    pub fn queue(&mut self, name: &Rc<str>) -> bool {
        if !self.seen.insert(Rc::clone(name)) {
            return false;
        }
        self.pending.push(Rc::clone(name));
        true
    }

    /// Take the pending names in first-queued order and enter the flushing state.
    pub fn begin_flush(&mut self) -> Vec<Rc<str>> {
        self.flushing = true;
        self.seen.clear();
        std::mem::take(&mut self.pending)
    }

    pub fn end_flush(&mut self) {
        self.flushing = false;
    }

    #[must_use]
    pub fn state(&self) -> QueueState {
        if self.flushing {
            QueueState::Flushing
        } else if self.pending.is_empty() {
            QueueState::Idle
        } else {
            QueueState::Queued
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Pending names in order.
    #[must_use]
    pub fn pending(&self) -> &[Rc<str>] {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.seen.clear();
    }
}
