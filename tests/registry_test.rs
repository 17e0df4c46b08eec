//! Integration tests for named engines sharing one delayable registry.

use std::rc::Rc;
use std::time::Duration;

use delayable_engine::Error;
use delayable_engine::delayable::DelayableRegistry;
use delayable_engine::delayables::{
    RangeArgs, SMART_HIGHLIGHT, SPELL_CHECK, SearchArgs, WordList, register_builtins,
};
use delayable_engine::document::{Buffer, Indicator, TextDocument};
use delayable_engine::engine::{EngineDefaults, EngineRegistry};
use delayable_engine::host::ManualTicks;
use delayable_engine::model::DocumentStore;

fn builtins() -> DelayableRegistry<Buffer> {
    let mut registry = DelayableRegistry::empty();
    register_builtins(&mut registry, Rc::new(WordList::from_words(["hello"])));
    registry
}

fn defaults(default_engine: Option<&str>) -> EngineDefaults {
    EngineDefaults {
        max_tick_time: Duration::from_secs(60),
        default_engine: default_engine.map(str::to_string),
        enabled: vec![SPELL_CHECK.to_string(), SMART_HIGHLIGHT.to_string()],
        ..EngineDefaults::default()
    }
}

#[test]
fn registry_lists_registered_keys() {
    let registry = builtins();
    assert!(registry.contains(SPELL_CHECK));
    assert!(registry.contains(SMART_HIGHLIGHT));
    assert!(!registry.contains("word_count"));
    let keys: Vec<_> = registry.keys().collect();
    assert_eq!(keys, [SPELL_CHECK, SMART_HIGHLIGHT]);
}

#[test]
fn instance_is_lookup_or_create() {
    let mut engines = EngineRegistry::new(builtins(), defaults(None));
    assert!(engines.get("main").is_none());

    engines.instance("main").set_max_tick_time(Duration::from_millis(3));
    engines.instance("side");

    assert_eq!(
        engines.instance("main").max_tick_time(),
        Duration::from_millis(3)
    );
    assert_eq!(
        engines.get("side").unwrap().max_tick_time(),
        Duration::from_secs(60)
    );
    let names: Vec<_> = engines.names().collect();
    assert_eq!(names, ["main", "side"]);
}

#[test]
fn new_engines_get_configured_delayables() {
    let mut defaults = defaults(None);
    defaults.enabled.push("word_count".to_string());
    let mut engines = EngineRegistry::new(builtins(), defaults);

    let engine = engines.instance("main");
    let keys: Vec<_> = engine.delayable_keys().collect();
    assert_eq!(keys, [SPELL_CHECK, SMART_HIGHLIGHT]);
}

#[test]
fn unknown_key_is_reported() {
    let mut engines = EngineRegistry::new(builtins(), defaults(None));
    let mut docs = DocumentStore::new();

    let result = engines.instance("main").add_delayable_by_key(&mut docs, "word_count");
    assert!(matches!(result, Err(Error::UnknownDelayable(key)) if key == "word_count"));
}

#[test]
fn released_document_moves_to_default_engine() {
    let mut engines = EngineRegistry::new(builtins(), defaults(Some("main")));
    let mut docs = DocumentStore::new();
    let id = docs.insert(Buffer::new("notes", "hello wrld"));

    assert!(engines.instance("popup").add_document(&mut docs, id));
    assert_eq!(engines.engine_of(id), Some("popup"));

    let now = engines.release_document(&mut docs, "popup", id);
    assert_eq!(now.as_deref(), Some("main"));
    assert_eq!(engines.engine_of(id), Some("main"));
    assert!(!engines.get("popup").unwrap().contains_document(id));
}

#[test]
fn release_from_default_engine_just_removes() {
    let mut engines = EngineRegistry::new(builtins(), defaults(Some("main")));
    let mut docs = DocumentStore::new();
    let id = docs.insert(Buffer::new("notes", ""));
    engines.instance("main").add_document(&mut docs, id);

    assert_eq!(engines.release_document(&mut docs, "main", id), None);
    assert_eq!(engines.engine_of(id), None);
}

#[test]
fn release_without_default_engine_just_removes() {
    let mut engines = EngineRegistry::new(builtins(), defaults(None));
    let mut docs = DocumentStore::new();
    let id = docs.insert(Buffer::new("notes", ""));
    engines.instance("popup").add_document(&mut docs, id);

    assert_eq!(engines.release_document(&mut docs, "popup", id), None);
    assert_eq!(engines.engine_of(id), None);
    assert_eq!(engines.names().count(), 1);
}

#[test]
fn tick_all_drives_only_running_engines() {
    let ticks = ManualTicks::new();
    let shared = ticks.clone();
    let mut engines = EngineRegistry::new(builtins(), defaults(None))
        .with_tick_sources(move |_| shared.clone());
    let mut docs = DocumentStore::new();
    let id = docs.insert(Buffer::new("notes", "hello wrld"));

    engines.instance("idle");
    let main = engines.instance("main");
    main.add_document(&mut docs, id);
    assert!(main.enqueue(
        &mut docs,
        id,
        SPELL_CHECK,
        RangeArgs::all()
    ));
    assert!(engines.is_running());
    assert!(ticks.is_active());

    let reports = engines.tick_all(&mut docs);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, "main");
    assert!(reports[0].1.drained);
    assert!(!engines.is_running());
    assert!(!ticks.is_active());
}

#[test]
fn document_is_served_by_one_engine_at_a_time() {
    let mut engines = EngineRegistry::new(builtins(), defaults(Some("main")));
    let mut docs = DocumentStore::new();
    let id = docs.insert(Buffer::new("notes", "hello wrld"));

    assert!(engines.add_document(&mut docs, "a", id));
    assert!(!engines.add_document(&mut docs, "b", id));
    assert!(!engines.add_document(&mut docs, "a", id));
    assert!(!engines.get("b").unwrap().contains_document(id));

    // Releasing from an engine that never held it changes nothing.
    assert_eq!(engines.release_document(&mut docs, "b", id), None);
    assert_eq!(engines.release_document(&mut docs, "nowhere", id), None);
    assert_eq!(engines.engine_of(id), Some("a"));
    assert!(engines.get("main").is_none());

    let b = engines.instance("b");
    assert!(!b.enqueue(&mut docs, id, SMART_HIGHLIGHT, SearchArgs::new("hello")));
    let a = engines.instance("a");
    assert!(a.enqueue(&mut docs, id, SPELL_CHECK, RangeArgs::all()));
    engines.tick_all(&mut docs);
    assert_eq!(
        docs.get(id).unwrap().indicators(Indicator::Misspelling),
        &[6..10]
    );
}

#[test]
fn removing_an_engine_detaches_its_documents() {
    let mut engines = EngineRegistry::new(builtins(), defaults(None));
    let mut docs = DocumentStore::new();
    let id = docs.insert(Buffer::new("notes", "hello wrld"));
    engines.add_document(&mut docs, "main", id);
    engines
        .instance("main")
        .enqueue(&mut docs, id, SPELL_CHECK, RangeArgs::all());
    engines.tick_all(&mut docs);
    assert!(!docs.get(id).unwrap().indicators(Indicator::Misspelling).is_empty());

    let removed = engines.remove(&mut docs, "main").unwrap();
    assert!(removed.documents().is_empty());
    assert!(docs.get(id).unwrap().indicators(Indicator::Misspelling).is_empty());
    assert_eq!(engines.engine_of(id), None);
    assert!(engines.remove(&mut docs, "main").is_none());

    // Free to join another engine now.
    assert!(engines.add_document(&mut docs, "other", id));
}

#[test]
fn new_engines_use_configured_event_capacity() {
    let mut defaults = defaults(None);
    defaults.event_capacity = 3;
    let mut engines = EngineRegistry::new(builtins(), defaults);
    assert_eq!(engines.instance("main").event_capacity(), 3);
}
