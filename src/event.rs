//! Structured events emitted by an engine.
//!
//! Hosts drain them after each tick to log task failures or react to the
//! engine going idle. Events are the engine's voice; tracing output is for
//! operators.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{DocumentId, RunStats};

/// A structured event emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic per-engine sequence number.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Work arrived on an idle engine and the tick source was started.
    Started,
    /// A tick drained all pending work and the tick source was stopped.
    Finished { stats: RunStats },
    /// A step failed; its work item was evicted.
    TaskFailed {
        document: DocumentId,
        key: String,
        error: String,
    },
    /// A document handle no longer resolved and was dropped.
    DocumentPurged { document: DocumentId },
    DelayableAdded { key: String },
    DelayableRemoved { key: String },
}

/// Events kept for the host when nobody drains them.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Bounded buffer of events waiting to be drained by the host. Once full,
/// the oldest event is dropped for each new one; the gap shows up in `seq`.
/// A capacity of zero turns recording off.
#[derive(Debug)]
pub(crate) struct EventLog {
    next_seq: u64,
    capacity: usize,
    dropped: u64,
    pending: VecDeque<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_seq: 0,
            capacity,
            dropped: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.trim();
    }

    /// Events discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn record(&mut self, kind: EventKind) {
        self.next_seq += 1;
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        self.pending.push_back(Event {
            seq: self.next_seq,
            timestamp: Utc::now(),
            kind,
        });
        self.trim();
    }

    pub fn drain(&mut self) -> Vec<Event> {
        self.pending.drain(..).collect()
    }

    fn trim(&mut self) {
        while self.pending.len() > self.capacity {
            self.pending.pop_front();
            self.dropped += 1;
        }
    }
}
