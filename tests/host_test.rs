//! Integration tests for the tokio-driven tick source.

use std::rc::Rc;
use std::time::Duration;

use delayable_engine::delayable::DelayableRegistry;
use delayable_engine::delayables::{RangeArgs, SPELL_CHECK, SpellCheck, WordList};
use delayable_engine::document::{Buffer, Indicator, TextDocument};
use delayable_engine::engine::Engine;
use delayable_engine::host::{IntervalTicker, TickSource};
use delayable_engine::model::DocumentStore;

#[tokio::test]
async fn driver_follows_engine_start_and_stop() {
    let (mut ticker, mut driver) = IntervalTicker::new(Duration::from_millis(1));
    assert!(!driver.is_active());

    ticker.start();
    assert!(driver.is_active());
    assert!(driver.next_tick().await);

    ticker.stop();
    assert!(!driver.is_active());

    drop(ticker);
    assert!(!driver.next_tick().await);
}

#[tokio::test]
async fn interval_ticker_drives_engine_to_idle() {
    let (ticker, mut driver) = IntervalTicker::new(Duration::from_millis(1));
    let mut engine = Engine::new("main", Rc::new(DelayableRegistry::empty()))
        .with_tick_source(ticker)
        .with_max_tick_time(Duration::ZERO);
    let mut docs = DocumentStore::new();
    let id = docs.insert(Buffer::new("notes.txt", "one\ntwoo\nthree\nfuor"));
    engine.add_document(&mut docs, id);
    engine.add_delayable(
        &mut docs,
        SpellCheck::new(WordList::from_words(["one", "two", "three", "four"])).with_chunk_lines(1),
    );

    engine.enqueue(&mut docs, id, SPELL_CHECK, RangeArgs::all());
    assert!(driver.is_active());

    let mut ticks = 0;
    while driver.is_active() && driver.next_tick().await {
        engine.tick(&mut docs);
        ticks += 1;
    }

    assert!(!engine.is_running());
    assert!(ticks >= 1);
    assert_eq!(
        docs.get(id).unwrap().indicators(Indicator::Misspelling),
        &[4..8, 15..19]
    );
}
