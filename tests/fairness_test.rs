//! Round-robin fairness and visibility deferral under a controlled clock.

use std::rc::Rc;
use std::time::Duration;

use delayable_engine::Result;
use delayable_engine::delayable::{Delayable, DelayableRegistry};
use delayable_engine::engine::Engine;
use delayable_engine::host::{ManualClock, ManualTicks};
use delayable_engine::model::{Document, DocumentId, DocumentStore, PendingWork};

#[derive(Default)]
struct Doc {
    pending: PendingWork,
    hidden: bool,
    serviced: Vec<String>,
}

impl Document for Doc {
    fn pending(&self) -> &PendingWork {
        &self.pending
    }

    fn pending_mut(&mut self) -> &mut PendingWork {
        &mut self.pending
    }

    fn is_visible(&self) -> bool {
        !self.hidden
    }
}

/// Takes one millisecond per step. `Some(n)` runs `n` more steps, `None`
/// never finishes.
struct Work {
    key: &'static str,
    clock: ManualClock,
    trace: Rc<std::cell::RefCell<Vec<(usize, &'static str)>>>,
}

impl Delayable<Doc> for Work {
    type Args = (usize, Option<u32>);

    fn key(&self) -> &str {
        self.key
    }

    fn step(
        &mut self,
        document: &mut Doc,
        (tag, left): (usize, Option<u32>),
    ) -> Result<Option<(usize, Option<u32>)>> {
        self.clock.advance(Duration::from_millis(1));
        document.serviced.push(self.key.to_string());
        self.trace.borrow_mut().push((tag, self.key));
        Ok(match left {
            None => Some((tag, None)),
            Some(n) if n > 1 => Some((tag, Some(n - 1))),
            Some(_) => None,
        })
    }

    fn merge(&self, _old: Self::Args, new: Self::Args) -> Self::Args {
        new
    }
}

struct Setup {
    engine: Engine<Doc>,
    docs: DocumentStore<Doc>,
    ids: Vec<DocumentId>,
    trace: Rc<std::cell::RefCell<Vec<(usize, &'static str)>>>,
}

/// `documents` documents served by one engine with delayables `keys`,
/// and a budget admitting `steps_per_tick` one-millisecond steps.
fn setup(documents: usize, keys: &[&'static str], steps_per_tick: u64) -> Setup {
    let clock = ManualClock::new();
    let trace = Rc::default();
    let mut engine = Engine::new("fair", Rc::new(DelayableRegistry::empty()))
        .with_clock(clock.clone())
        .with_tick_source(ManualTicks::new())
        .with_max_tick_time(Duration::from_millis(steps_per_tick - 1));
    let mut docs = DocumentStore::new();

    for &key in keys {
        engine.add_delayable(
            &mut docs,
            Work {
                key,
                clock: clock.clone(),
                trace: Rc::clone(&trace),
            },
        );
    }
    let ids = (0..documents)
        .map(|_| {
            let id = docs.insert(Doc::default());
            engine.add_document(&mut docs, id);
            id
        })
        .collect();

    Setup {
        engine,
        docs,
        ids,
        trace,
    }
}

#[test]
fn busy_documents_share_ticks_evenly() {
    for (documents, per_tick, ticks) in [(3, 2, 9), (3, 2, 7), (4, 3, 5), (5, 1, 12), (2, 5, 3)] {
        let Setup {
            mut engine,
            mut docs,
            ids,
            ..
        } = setup(documents, &["work"], per_tick);
        for (tag, &id) in ids.iter().enumerate() {
            assert!(engine.enqueue(&mut docs, id, "work", (tag, None::<u32>)));
        }

        for _ in 0..ticks {
            let report = engine.tick(&mut docs);
            assert_eq!(report.processed, per_tick as usize);
            assert!(!report.drained);
        }

        let total = ticks * per_tick as usize;
        let floor = total / documents;
        let ceil = total.div_ceil(documents);
        for &id in &ids {
            let serviced = docs.get(id).unwrap().serviced.len();
            assert!(
                (floor..=ceil).contains(&serviced),
                "{documents} docs, {per_tick}/tick, {ticks} ticks: serviced {serviced}, want {floor}..={ceil}"
            );
        }
    }
}

#[test]
fn keys_within_a_document_alternate() {
    let Setup {
        mut engine,
        mut docs,
        ids,
        trace,
    } = setup(1, &["a", "b"], 1);
    engine.enqueue(&mut docs, ids[0], "a", (0usize, None::<u32>));
    engine.enqueue(&mut docs, ids[0], "b", (0usize, None::<u32>));

    for _ in 0..6 {
        engine.tick(&mut docs);
    }
    let keys: Vec<_> = trace.borrow().iter().map(|(_, key)| *key).collect();
    assert_eq!(keys, ["a", "b", "a", "b", "a", "b"]);
}

#[test]
fn hidden_documents_wait_for_the_second_pass() {
    let Setup {
        mut engine,
        mut docs,
        ids,
        trace,
    } = setup(2, &["work"], 100);
    docs.get_mut(ids[0]).unwrap().hidden = true;
    engine.enqueue(&mut docs, ids[0], "work", (0usize, Some(1u32)));
    engine.enqueue(&mut docs, ids[1], "work", (1usize, Some(1u32)));

    let report = engine.tick(&mut docs);

    assert!(report.drained);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.processed, 2);
    let order: Vec<_> = trace.borrow().iter().map(|(tag, _)| *tag).collect();
    assert_eq!(order, [1, 0]);
}

#[test]
fn hidden_document_is_serviced_when_alone() {
    let Setup {
        mut engine,
        mut docs,
        ids,
        ..
    } = setup(1, &["work"], 100);
    docs.get_mut(ids[0]).unwrap().hidden = true;
    engine.enqueue(&mut docs, ids[0], "work", (0usize, Some(3u32)));

    let report = engine.tick(&mut docs);

    assert!(report.drained);
    assert_eq!(report.skipped, 1);
    assert_eq!(docs.get(ids[0]).unwrap().serviced.len(), 3);
}

#[test]
fn tick_stops_once_budget_is_exceeded() {
    let Setup {
        mut engine,
        mut docs,
        ids,
        ..
    } = setup(1, &["work"], 4);
    engine.enqueue(&mut docs, ids[0], "work", (0usize, Some(10u32)));

    let first = engine.tick(&mut docs);
    assert_eq!(first.processed, 4);
    assert_eq!(first.elapsed, Duration::from_millis(4));
    assert!(engine.is_running());

    let mut ticks = 1;
    while engine.is_running() {
        engine.tick(&mut docs);
        ticks += 1;
    }
    assert_eq!(ticks, 3);
    assert_eq!(engine.run_stats().processed, 10);
    assert_eq!(engine.run_stats().ticks, 3);
}
