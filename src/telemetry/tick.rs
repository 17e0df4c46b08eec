//! Tick span helpers.

use tracing::Span;

use crate::model::TickReport;

/// Start a span covering one engine tick.
///
/// The report fields are declared empty and filled in by
/// [`record_tick_report`].
pub fn start_tick_span(engine: &str) -> Span {
    tracing::debug_span!(
        "delayable.tick",
        "delayable.engine" = engine,
        "delayable.processed" = tracing::field::Empty,
        "delayable.skipped" = tracing::field::Empty,
        "delayable.failures" = tracing::field::Empty,
        "delayable.elapsed_us" = tracing::field::Empty,
        "delayable.drained" = tracing::field::Empty,
    )
}

/// Record what a tick did on its span.
pub fn record_tick_report(span: &Span, report: &TickReport) {
    span.record("delayable.processed", report.processed as u64);
    span.record("delayable.skipped", report.skipped as u64);
    span.record("delayable.failures", report.failures as u64);
    span.record("delayable.elapsed_us", report.elapsed.as_micros() as u64);
    span.record("delayable.drained", report.drained);
}
