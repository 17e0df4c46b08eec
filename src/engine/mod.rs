//! The delayable engine.
//!
//! An engine holds handles to the documents it serves, the delayables that
//! are active on them and the round-robin cursors that make `tick` fair.
//! Documents themselves stay owned by the host's [`DocumentStore`].

mod registry;
mod tick;

pub use registry::{EngineDefaults, EngineRegistry};

use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::delayable::{AnyDelayable, Delayable, DelayableRegistry};
use crate::error::Result;
use crate::event::{Event, EventKind, EventLog};
use crate::host::{Clock, ManualTicks, SystemClock, TickSource};
use crate::model::{Document, DocumentId, DocumentStore, ErasedArgs, RunStats, TickReport};

/// Default time budget for a single tick.
pub const DEFAULT_MAX_TICK_TIME: Duration = Duration::from_millis(20);

/// Cooperative, time-sliced scheduler for delayables over documents.
///
/// All methods take `&mut self`: an engine is driven from one logical
/// thread of control and `tick` is never re-entered.
pub struct Engine<D: Document> {
    name: String,
    registry: Rc<DelayableRegistry<D>>,
    delayables: IndexMap<String, Box<dyn AnyDelayable<D>>>,
    documents: Vec<DocumentId>,
    /// Slot in `documents` the next tick starts from.
    document_index: usize,
    /// Slot in a document's pending table the next key rotation starts from.
    delayable_index: usize,
    max_tick_time: Duration,
    clock: Rc<dyn Clock>,
    ticks: Box<dyn TickSource>,
    running: bool,
    last_report: TickReport,
    run_stats: RunStats,
    events: EventLog,
}

impl<D: Document> Engine<D> {
    /// Create an idle engine resolving keys through `registry`.
    pub fn new(name: impl Into<String>, registry: Rc<DelayableRegistry<D>>) -> Self {
        Self {
            name: name.into(),
            registry,
            delayables: IndexMap::new(),
            documents: Vec::new(),
            document_index: 0,
            delayable_index: 0,
            max_tick_time: DEFAULT_MAX_TICK_TIME,
            clock: Rc::new(SystemClock::new()),
            ticks: Box::new(ManualTicks::new()),
            running: false,
            last_report: TickReport::default(),
            run_stats: RunStats::default(),
            events: EventLog::default(),
        }
    }

    /// Measure tick budgets against `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self
    }

    /// Install the tick source started when work arrives and stopped when
    /// it drains. Defaults to [`ManualTicks`].
    pub fn with_tick_source(mut self, ticks: impl TickSource + 'static) -> Self {
        self.ticks = Box::new(ticks);
        self
    }

    /// Time budget for one tick. Defaults to [`DEFAULT_MAX_TICK_TIME`].
    pub fn with_max_tick_time(mut self, budget: Duration) -> Self {
        self.max_tick_time = budget;
        self
    }

    /// How many undrained events to keep before dropping the oldest.
    /// Zero disables event recording. Defaults to
    /// [`crate::event::DEFAULT_EVENT_CAPACITY`].
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events.set_capacity(capacity);
        self
    }

    pub(crate) fn set_shared_clock(&mut self, clock: Rc<dyn Clock>) {
        self.clock = clock;
    }

    pub(crate) fn set_boxed_tick_source(&mut self, ticks: Box<dyn TickSource>) {
        self.ticks = ticks;
    }

    /// Name the engine was created under; used as the `engine` field in
    /// logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the tick source is running, i.e. work may be pending.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current time budget for one tick.
    pub fn max_tick_time(&self) -> Duration {
        self.max_tick_time
    }

    /// Change the time budget. Takes effect from the next tick.
    pub fn set_max_tick_time(&mut self, budget: Duration) {
        self.max_tick_time = budget;
    }

    /// Handles of the documents this engine serves, in service order.
    pub fn documents(&self) -> &[DocumentId] {
        &self.documents
    }

    pub fn contains_document(&self, id: DocumentId) -> bool {
        self.documents.contains(&id)
    }

    /// Keys of the active delayables, in registration order.
    pub fn delayable_keys(&self) -> impl Iterator<Item = &str> {
        self.delayables.keys().map(String::as_str)
    }

    /// Report of the most recent tick.
    pub fn last_report(&self) -> TickReport {
        self.last_report
    }

    /// Totals since the engine last started.
    pub fn run_stats(&self) -> RunStats {
        self.run_stats
    }

    /// Number of work items this engine has pending across its live
    /// documents.
    pub fn pending_count(&self, documents: &DocumentStore<D>) -> usize {
        self.documents
            .iter()
            .filter_map(|id| documents.get(*id))
            .flat_map(|document| document.pending().keys())
            .filter(|key| self.delayables.contains_key(*key))
            .count()
    }

    /// Take the events recorded since the last call.
    ///
    /// Only the newest [`Engine::event_capacity`] events are kept between
    /// drains.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn event_capacity(&self) -> usize {
        self.events.capacity()
    }

    /// Events discarded because nobody drained them in time.
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }

    // -----------------------------------------------------------------------
    // Delayables
    // -----------------------------------------------------------------------

    /// Register `delayable`, replacing any instance under the same key.
    ///
    /// A replaced instance is removed first: detached from every document
    /// and its pending work purged.
    pub fn add_delayable<T>(&mut self, documents: &mut DocumentStore<D>, delayable: T)
    where
        T: Delayable<D>,
    {
        let key = delayable.key().to_string();
        self.remove_delayable(documents, &key);
        self.install(documents, key, Box::new(delayable));
    }

    /// Enable the delayable registered under `key` unless one is already
    /// active under that key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownDelayable`] if the registry has no
    /// factory for `key`.
    pub fn add_delayable_by_key(
        &mut self,
        documents: &mut DocumentStore<D>,
        key: &str,
    ) -> Result<()> {
        if self.delayables.contains_key(key) {
            return Ok(());
        }
        let delayable = self.registry.create(key)?;
        self.install(documents, key.to_string(), delayable);
        Ok(())
    }

    /// Enable a delayable on an engine that holds no documents yet.
    pub(crate) fn enable_detached(&mut self, key: &str) -> Result<()> {
        debug_assert!(self.documents.is_empty());
        if self.delayables.contains_key(key) {
            return Ok(());
        }
        let delayable = self.registry.create(key)?;
        self.delayables.insert(key.to_string(), delayable);
        self.events.record(EventKind::DelayableAdded {
            key: key.to_string(),
        });
        Ok(())
    }

    fn install(
        &mut self,
        documents: &mut DocumentStore<D>,
        key: String,
        mut delayable: Box<dyn AnyDelayable<D>>,
    ) {
        if delayable.key() != key {
            warn!(
                engine = %self.name,
                key = %key,
                reported = delayable.key(),
                "delayable reports a different key than it was registered under"
            );
        }
        for id in &self.documents {
            if let Some(document) = documents.get_mut(*id) {
                delayable.attach(document);
            }
        }
        debug!(engine = %self.name, key = %key, "delayable added");
        self.events
            .record(EventKind::DelayableAdded { key: key.clone() });
        self.delayables.insert(key, delayable);
    }

    /// Detach and drop the delayable under `key`, purging its work from
    /// every document. Returns whether one was active.
    pub fn remove_delayable(&mut self, documents: &mut DocumentStore<D>, key: &str) -> bool {
        let Some(mut delayable) = self.delayables.shift_remove(key) else {
            return false;
        };
        for id in &self.documents {
            if let Some(document) = documents.get_mut(*id) {
                delayable.detach(document);
                document.pending_mut().remove(key);
            }
        }
        debug!(engine = %self.name, key, "delayable removed");
        self.events.record(EventKind::DelayableRemoved {
            key: key.to_string(),
        });
        true
    }

    pub fn delayable_enabled(&self, key: &str) -> bool {
        self.delayables.contains_key(key)
    }

    /// Enable (through the registry) or remove the delayable under `key`.
    pub fn set_delayable_enabled(
        &mut self,
        documents: &mut DocumentStore<D>,
        key: &str,
        enabled: bool,
    ) -> Result<()> {
        if enabled {
            self.add_delayable_by_key(documents, key)
        } else {
            self.remove_delayable(documents, key);
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// Start serving a document, attaching every active delayable to it.
    ///
    /// Returns `false` if the document is already served or its handle does
    /// not resolve. An engine only knows its own documents; go through
    /// [`EngineRegistry::add_document`] to keep engines from sharing one.
    pub fn add_document(&mut self, documents: &mut DocumentStore<D>, id: DocumentId) -> bool {
        if self.documents.contains(&id) {
            return false;
        }
        let Some(document) = documents.get_mut(id) else {
            return false;
        };
        for delayable in self.delayables.values_mut() {
            delayable.attach(document);
        }
        self.documents.push(id);
        debug!(engine = %self.name, document = %id, "document added");
        true
    }

    /// Stop serving a document: detach every delayable and purge the
    /// document's work for them. Returns `false` if the document was not served.
    pub fn remove_document(&mut self, documents: &mut DocumentStore<D>, id: DocumentId) -> bool {
        if !self.forget(id) {
            return false;
        }
        if let Some(document) = documents.get_mut(id) {
            for (key, delayable) in self.delayables.iter_mut() {
                delayable.detach(document);
                document.pending_mut().remove(key);
            }
        }
        debug!(engine = %self.name, document = %id, "document removed");
        true
    }

    /// Drop `id` from the service order, keeping the cursor on the same
    /// next document.
    fn forget(&mut self, id: DocumentId) -> bool {
        let Some(position) = self.documents.iter().position(|d| *d == id) else {
            return false;
        };
        self.documents.remove(position);
        if position < self.document_index {
            self.document_index -= 1;
        }
        true
    }

    // -----------------------------------------------------------------------
    // Work
    // -----------------------------------------------------------------------

    /// Queue work for `key` on a document, merging with any request still
    /// pending for the same pair, and start ticking if idle.
    ///
    /// Returns `false` without doing anything if no delayable is active
    /// under `key`, the document is not served by this engine (or no longer
    /// exists), or `args` is not the delayable's argument type.
    pub fn enqueue<A: 'static>(
        &mut self,
        documents: &mut DocumentStore<D>,
        id: DocumentId,
        key: &str,
        args: A,
    ) -> bool {
        let Some(delayable) = self.delayables.get(key) else {
            trace!(engine = %self.name, key, "enqueue for inactive delayable ignored");
            return false;
        };
        if !delayable.accepts(&args) {
            warn!(engine = %self.name, key, "enqueue with mismatched arguments ignored");
            return false;
        }
        if !self.documents.contains(&id) {
            return false;
        }
        let Some(document) = documents.get_mut(id) else {
            return false;
        };

        let args: ErasedArgs = Box::new(args);
        let pending = document.pending_mut();
        match pending.take(key) {
            Some((index, key, old)) => {
                let merged = delayable.merge(old, args);
                pending.restore(index, key, merged);
            }
            None => pending.insert(key.to_string(), args),
        }

        if !self.running {
            self.start();
        }
        true
    }

    fn start(&mut self) {
        self.running = true;
        self.run_stats = RunStats::default();
        self.ticks.start();
        self.events.record(EventKind::Started);
        debug!(engine = %self.name, "tick source started");
    }
}
