//! The scheduling step.

use opentelemetry::KeyValue;
use tracing::{debug, info, warn};

use super::Engine;
use crate::event::EventKind;
use crate::model::{Document, DocumentId, DocumentStore, TickReport};
use crate::telemetry::{metrics, tick as tick_span};

impl<D: Document> Engine<D> {
    /// Run pending work until the time budget is spent or nothing is left.
    ///
    /// Documents and, within a document, delayable keys are serviced in
    /// round-robin order starting where the previous tick stopped. Hidden
    /// documents are skipped on the first pass over the documents and
    /// serviced on later passes. Once a pass finds nothing left to do, the
    /// tick source is stopped and a [`EventKind::Finished`] event recorded.
    ///
    /// Ticking an idle engine does nothing.
    pub fn tick(&mut self, documents: &mut DocumentStore<D>) -> TickReport {
        if !self.running {
            return TickReport::default();
        }

        let span = tick_span::start_tick_span(&self.name);
        let _enter = span.enter();

        let start = self.clock.now();
        let mut report = TickReport::default();
        let order = self.rotated_documents();
        let mut first_pass = true;

        loop {
            let mut finished = true;

            for &id in &order {
                // Purged earlier in this tick.
                let Some(position) = self.documents.iter().position(|d| *d == id) else {
                    continue;
                };
                self.document_index = (position + 1) % self.documents.len();

                let Some(document) = documents.get_mut(id) else {
                    self.purge(id);
                    continue;
                };
                if !self.has_work(document) {
                    continue;
                }
                if first_pass && !document.is_visible() {
                    report.skipped += 1;
                    finished = false;
                    continue;
                }

                for key in self.rotated_keys(document) {
                    // Work queued by another engine serving the same document.
                    if !self.delayables.contains_key(&key) {
                        continue;
                    }
                    let pending = document.pending_mut();
                    let slots = pending.len();
                    let Some((index, key, args)) = pending.take(&key) else {
                        continue;
                    };
                    self.delayable_index = (index + 1) % slots;

                    let Some(delayable) = self.delayables.get_mut(&key) else {
                        document.pending_mut().restore(index, key, args);
                        continue;
                    };

                    match delayable.step(document, args) {
                        Ok(Some(next)) => {
                            document.pending_mut().restore(index, key, next);
                            finished = false;
                        }
                        Ok(None) => {}
                        Err(error) => {
                            report.failures += 1;
                            warn!(
                                engine = %self.name,
                                document = %id,
                                key = %key,
                                %error,
                                "delayable step failed, work item evicted"
                            );
                            metrics::step_failures().add(
                                1,
                                &[
                                    KeyValue::new("engine", self.name.clone()),
                                    KeyValue::new("key", key.clone()),
                                ],
                            );
                            self.events.record(EventKind::TaskFailed {
                                document: id,
                                key,
                                error: error.to_string(),
                            });
                        }
                    }

                    report.processed += 1;
                    let elapsed = self.clock.now().saturating_sub(start);
                    if elapsed > self.max_tick_time {
                        report.elapsed = elapsed;
                        self.finish_tick(&span, report);
                        return report;
                    }
                }
            }

            first_pass = false;
            if finished {
                break;
            }
        }

        report.elapsed = self.clock.now().saturating_sub(start);
        report.drained = true;
        self.finish_tick(&span, report);

        self.running = false;
        self.ticks.stop();
        info!(
            engine = %self.name,
            ticks = self.run_stats.ticks,
            processed = self.run_stats.processed,
            failures = self.run_stats.failures,
            "pending work drained"
        );
        self.events.record(EventKind::Finished {
            stats: self.run_stats,
        });
        report
    }

    fn finish_tick(&mut self, span: &tracing::Span, report: TickReport) {
        self.last_report = report;
        self.run_stats.absorb(&report);
        tick_span::record_tick_report(span, &report);

        let engine = KeyValue::new("engine", self.name.clone());
        metrics::ticks().add(1, std::slice::from_ref(&engine));
        metrics::steps().add(report.processed as u64, std::slice::from_ref(&engine));
        metrics::tick_duration_ms().record(report.elapsed.as_secs_f64() * 1000.0, &[engine]);
    }

    /// Served documents, starting at the persistent cursor.
    fn rotated_documents(&self) -> Vec<DocumentId> {
        let len = self.documents.len();
        if len == 0 {
            return Vec::new();
        }
        let start = self.document_index % len;
        self.documents[start..]
            .iter()
            .chain(&self.documents[..start])
            .copied()
            .collect()
    }

    /// Whether `document` has pending work for one of this engine's
    /// delayables.
    pub(super) fn has_work(&self, document: &D) -> bool {
        document
            .pending()
            .keys()
            .any(|key| self.delayables.contains_key(key))
    }

    /// A document's pending keys, starting at the persistent cursor.
    fn rotated_keys(&self, document: &D) -> Vec<String> {
        let pending = document.pending();
        let len = pending.len();
        if len == 0 {
            return Vec::new();
        }
        let start = self.delayable_index % len;
        (0..len)
            .filter_map(|offset| pending.key_at((start + offset) % len))
            .map(str::to_string)
            .collect()
    }

    /// Forget a document whose handle no longer resolves.
    fn purge(&mut self, id: DocumentId) {
        self.forget(id);
        debug!(engine = %self.name, document = %id, "stale document purged");
        metrics::purged_documents().add(1, &[KeyValue::new("engine", self.name.clone())]);
        self.events
            .record(EventKind::DocumentPurged { document: id });
    }
}
