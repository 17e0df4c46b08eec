//! Integration tests for telemetry initialization and span helpers.

use std::time::Duration;

use delayable_engine::model::TickReport;
use delayable_engine::telemetry::{self, metrics, tick};

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process, so this may
    // return Err if another test got there first.
    let config = telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "delayable-test".to_string(),
        log_level: "debug".to_string(),
    };
    let _guard = telemetry::init_telemetry(config);
}

#[test]
fn tick_span_creates_and_records_report() {
    let span = tick::start_tick_span("main");
    let _enter = span.enter();
    tick::record_tick_report(
        &span,
        &TickReport {
            processed: 12,
            elapsed: Duration::from_micros(1500),
            skipped: 1,
            failures: 0,
            drained: true,
        },
    );
}

#[test]
fn metric_instruments_work_without_provider() {
    metrics::ticks().add(1, &[]);
    metrics::steps().add(3, &[]);
    metrics::step_failures().add(1, &[]);
    metrics::purged_documents().add(1, &[]);
    metrics::tick_duration_ms().record(2.5, &[]);
}
