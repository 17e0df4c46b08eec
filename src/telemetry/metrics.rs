//! Metric instrument factories for delayable-engine.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"delayable-engine"` meter.
//! Without a provider they are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for delayable-engine instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("delayable-engine")
}

/// Counter: ticks run.
/// Labels: `engine`.
pub fn ticks() -> Counter<u64> {
    meter()
        .u64_counter("delayable.ticks")
        .with_description("Number of engine ticks")
        .build()
}

/// Counter: delayable steps performed.
/// Labels: `engine`.
pub fn steps() -> Counter<u64> {
    meter()
        .u64_counter("delayable.steps")
        .with_description("Number of delayable steps performed")
        .build()
}

/// Counter: work items evicted because their step failed.
/// Labels: `engine`, `key`.
pub fn step_failures() -> Counter<u64> {
    meter()
        .u64_counter("delayable.failures")
        .with_description("Number of failed delayable steps")
        .build()
}

/// Counter: stale document handles dropped during a tick.
/// Labels: `engine`.
pub fn purged_documents() -> Counter<u64> {
    meter()
        .u64_counter("delayable.purged_documents")
        .with_description("Number of stale documents purged")
        .build()
}

/// Histogram: time spent inside a tick, in milliseconds.
/// Labels: `engine`.
pub fn tick_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("delayable.tick.duration_ms")
        .with_description("Tick duration in milliseconds")
        .with_unit("ms")
        .build()
}
