//! Core data model.
//!
//! Documents are owned by the host and referenced by generation-checked
//! handles. Each document embeds its own table of pending work, keyed by
//! delayable, which only the engine and the delayables write to.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle to a document in a [`DocumentStore`].
    ///
    /// Handles are generation-checked: once the document is removed the
    /// handle never resolves again, even if its slot is reused.
    pub struct DocumentId;
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // KeyData's Debug is `<index>v<version>`, which is what we want to read in logs.
        write!(f, "{:?}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// What the engine needs from a document.
///
/// Task-specific accessors (text, highlight ranges, ...) live on separate
/// traits such as [`crate::document::TextDocument`].
pub trait Document: 'static {
    /// The document's pending work table.
    fn pending(&self) -> &PendingWork;

    fn pending_mut(&mut self) -> &mut PendingWork;

    /// Whether the document is currently on screen. Hidden documents are
    /// deferred during the first pass of a tick.
    fn is_visible(&self) -> bool {
        true
    }
}

/// Host-owned arena of documents.
///
/// Engines never own documents; they receive the store on every call that
/// touches one and purge handles that no longer resolve.
pub struct DocumentStore<D> {
    documents: SlotMap<DocumentId, D>,
}

impl<D> DocumentStore<D> {
    pub fn new() -> Self {
        Self {
            documents: SlotMap::with_key(),
        }
    }

    pub fn insert(&mut self, document: D) -> DocumentId {
        self.documents.insert(document)
    }

    /// Close a document. Engines holding its handle purge it lazily.
    pub fn remove(&mut self, id: DocumentId) -> Option<D> {
        self.documents.remove(id)
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.documents.contains_key(id)
    }

    pub fn get(&self, id: DocumentId) -> Option<&D> {
        self.documents.get(id)
    }

    pub fn get_mut(&mut self, id: DocumentId) -> Option<&mut D> {
        self.documents.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentId, &D)> {
        self.documents.iter()
    }
}

impl<D> Default for DocumentStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Pending work
// ---------------------------------------------------------------------------

/// Type-erased continuation arguments. Only the owning delayable knows the
/// concrete type.
pub type ErasedArgs = Box<dyn Any>;

/// Insertion-ordered `key -> args` table of work waiting on a document.
///
/// There is at most one entry per delayable key. Servicing an entry keeps
/// its position, so round-robin cursors stay meaningful across ticks.
#[derive(Default)]
pub struct PendingWork {
    items: IndexMap<String, ErasedArgs>,
}

impl PendingWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Borrow the stored args for `key` if they are of type `A`.
    pub fn get<A: 'static>(&self, key: &str) -> Option<&A> {
        self.items.get(key).and_then(|args| args.downcast_ref::<A>())
    }

    pub(crate) fn key_at(&self, index: usize) -> Option<&str> {
        self.items.get_index(index).map(|(k, _)| k.as_str())
    }

    /// Take the args for `key` out of the table, remembering its slot.
    pub(crate) fn take(&mut self, key: &str) -> Option<(usize, String, ErasedArgs)> {
        self.items.shift_remove_full(key)
    }

    /// Put args back into the slot they were taken from.
    pub(crate) fn restore(&mut self, index: usize, key: String, args: ErasedArgs) {
        let index = index.min(self.items.len());
        self.items.shift_insert(index, key, args);
    }

    pub(crate) fn insert(&mut self, key: String, args: ErasedArgs) {
        self.items.insert(key, args);
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        self.items.shift_remove(key).is_some()
    }
}

impl fmt::Debug for PendingWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.keys()).finish()
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// What a single call to [`crate::engine::Engine::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Number of `step` calls made.
    pub processed: usize,
    /// Time spent inside the tick.
    pub elapsed: Duration,
    /// Hidden documents deferred during the first pass.
    pub skipped: usize,
    /// Work items evicted because their step failed.
    pub failures: usize,
    /// All pending work is done and the tick source was stopped.
    pub drained: bool,
}

/// Totals since the engine last went from idle to running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub ticks: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failures: usize,
    pub elapsed: Duration,
}

impl RunStats {
    pub(crate) fn absorb(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.processed += report.processed;
        self.skipped += report.skipped;
        self.failures += report.failures;
        self.elapsed += report.elapsed;
    }
}
