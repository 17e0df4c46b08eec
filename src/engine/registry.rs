//! Named engines.
//!
//! Independent engines (one per top-level window, say) coexist with their
//! own documents and tick sources while sharing one delayable registry.

use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::{DEFAULT_MAX_TICK_TIME, Engine};
use crate::delayable::DelayableRegistry;
use crate::event::DEFAULT_EVENT_CAPACITY;
use crate::host::{Clock, ManualTicks, SystemClock, TickSource};
use crate::model::{Document, DocumentId, DocumentStore, TickReport};

/// Settings applied to every engine the registry creates.
#[derive(Debug, Clone)]
pub struct EngineDefaults {
    pub max_tick_time: Duration,
    /// Engine that receives documents released from other engines.
    pub default_engine: Option<String>,
    /// Delayable keys enabled on new engines.
    pub enabled: Vec<String>,
    /// Undrained events each engine keeps.
    pub event_capacity: usize,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            max_tick_time: DEFAULT_MAX_TICK_TIME,
            default_engine: None,
            enabled: Vec::new(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

type TickSourceFactory = Box<dyn Fn(&str) -> Box<dyn TickSource>>;

/// Lookup-or-create registry of engines by name.
pub struct EngineRegistry<D: Document> {
    delayables: Rc<DelayableRegistry<D>>,
    defaults: EngineDefaults,
    engines: IndexMap<String, Engine<D>>,
    clock: Rc<dyn Clock>,
    tick_sources: TickSourceFactory,
}

impl<D: Document> EngineRegistry<D> {
    pub fn new(delayables: DelayableRegistry<D>, defaults: EngineDefaults) -> Self {
        Self {
            delayables: Rc::new(delayables),
            defaults,
            engines: IndexMap::new(),
            clock: Rc::new(SystemClock::new()),
            tick_sources: Box::new(|_| Box::new(ManualTicks::new())),
        }
    }

    /// Clock shared by every engine created from now on.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self
    }

    /// Build the tick source for each new engine from its name.
    pub fn with_tick_sources<F, T>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> T + 'static,
        T: TickSource + 'static,
    {
        self.tick_sources = Box::new(move |name| Box::new(factory(name)));
        self
    }

    pub fn defaults(&self) -> &EngineDefaults {
        &self.defaults
    }

    pub fn delayables(&self) -> &DelayableRegistry<D> {
        &self.delayables
    }

    /// The engine called `name`, created with the registry defaults if it
    /// does not exist yet.
    pub fn instance(&mut self, name: &str) -> &mut Engine<D> {
        if !self.engines.contains_key(name) {
            let engine = self.create(name);
            self.engines.insert(name.to_string(), engine);
        }
        &mut self.engines[name]
    }

    fn create(&self, name: &str) -> Engine<D> {
        let mut engine = Engine::new(name, Rc::clone(&self.delayables))
            .with_max_tick_time(self.defaults.max_tick_time)
            .with_event_capacity(self.defaults.event_capacity);
        engine.set_shared_clock(Rc::clone(&self.clock));
        engine.set_boxed_tick_source((self.tick_sources)(name));

        for key in &self.defaults.enabled {
            if let Err(e) = engine.enable_detached(key) {
                warn!(engine = name, key = %key, "skipping configured delayable: {e}");
            }
        }
        debug!(engine = name, "engine created");
        engine
    }

    pub fn get(&self, name: &str) -> Option<&Engine<D>> {
        self.engines.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Engine<D>> {
        self.engines.get_mut(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }

    /// Drop an engine after removing every document it serves, so no
    /// indicators or pending work of its delayables are left behind.
    pub fn remove(&mut self, documents: &mut DocumentStore<D>, name: &str) -> Option<Engine<D>> {
        let mut engine = self.engines.shift_remove(name)?;
        for id in engine.documents().to_vec() {
            engine.remove_document(documents, id);
        }
        debug!(engine = name, "engine removed");
        Some(engine)
    }

    /// Hand a document to the engine `name`, creating the engine if needed.
    ///
    /// Returns `false` if any engine already serves the document, or its
    /// handle does not resolve. Release it from its engine first to move it.
    pub fn add_document(
        &mut self,
        documents: &mut DocumentStore<D>,
        name: &str,
        id: DocumentId,
    ) -> bool {
        if let Some(owner) = self.engine_of(id) {
            if owner != name {
                warn!(engine = name, owner, document = %id, "document already served by another engine");
            }
            return false;
        }
        self.instance(name).add_document(documents, id)
    }

    /// The name of the engine serving `id`, if any.
    pub fn engine_of(&self, id: DocumentId) -> Option<&str> {
        self.engines
            .iter()
            .find(|(_, engine)| engine.contains_document(id))
            .map(|(name, _)| name.as_str())
    }

    /// Remove a document from the engine `name` and hand it to the default
    /// engine, if one is configured and it is a different engine.
    ///
    /// Returns the name of the engine now serving the document. Does
    /// nothing and returns `None` if `name` does not serve it.
    pub fn release_document(
        &mut self,
        documents: &mut DocumentStore<D>,
        name: &str,
        id: DocumentId,
    ) -> Option<String> {
        let removed = self
            .engines
            .get_mut(name)
            .is_some_and(|engine| engine.remove_document(documents, id));
        if !removed {
            return None;
        }

        let default = self.defaults.default_engine.clone()?;
        if default == name {
            return None;
        }
        if self.add_document(documents, &default, id) {
            debug!(from = name, to = %default, document = %id, "document reassigned");
            Some(default)
        } else {
            None
        }
    }

    /// Tick every running engine once.
    pub fn tick_all(&mut self, documents: &mut DocumentStore<D>) -> Vec<(String, TickReport)> {
        self.engines
            .iter_mut()
            .filter(|(_, engine)| engine.is_running())
            .map(|(name, engine)| (name.clone(), engine.tick(documents)))
            .collect()
    }

    /// Whether any engine still has work pending.
    pub fn is_running(&self) -> bool {
        self.engines.values().any(Engine::is_running)
    }
}
