// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{
    describe_counter, describe_gauge, describe_histogram, gauge, histogram, increment_counter,
    Unit,
};

// NOTE: When observability feature is disabled, the macros below compile to no-ops
// that still evaluate their arguments.

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        let _ = &$value;
        $(let _ = (&$label, &$label_value);)*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        let _ = &$value;
        $(let _ = (&$label, &$label_value);)*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! increment_counter {
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        $(let _ = (&$label, &$label_value);)*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{describe_counter, describe_gauge, describe_histogram, gauge, histogram, increment_counter};

use std::time::Duration;

/// Registers metric descriptions. Call once at startup.
pub fn describe_metrics() {
    describe_counter!(
        "thera_cycles_total",
        Unit::Count,
        "Poll cycles, labeled by outcome (completed, skipped)."
    );
    describe_histogram!(
        "thera_cycle_duration_ms",
        "Wall time of a completed poll cycle in milliseconds."
    );
    describe_counter!(
        "thera_feed_errors_total",
        Unit::Count,
        "Failed Eve-Scout signature fetches."
    );
    describe_counter!(
        "thera_distance_lookups_total",
        Unit::Count,
        "Distance lookups, labeled by result (hit, miss, error)."
    );
    describe_counter!(
        "thera_notifications_total",
        Unit::Count,
        "Route alerts, labeled by result (sent, suppressed, failed)."
    );
    describe_gauge!(
        "thera_tracked_fingerprints",
        "Routes currently remembered by the notification tracker."
    );
    describe_gauge!("thera_distance_cache_size", "Entries in the distance cache.");
}

/// Serves `/metrics` for Prometheus on the given port.
#[cfg(feature = "observability")]
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    describe_metrics();
    Ok(())
}

pub fn increment_cycle(outcome: &'static str) {
    increment_counter!("thera_cycles_total", "outcome" => outcome);
}

pub fn record_cycle_duration(elapsed: Duration) {
    histogram!("thera_cycle_duration_ms", elapsed.as_secs_f64() * 1000.0);
}

pub fn increment_feed_error() {
    increment_counter!("thera_feed_errors_total");
}

pub fn increment_distance_lookup(result: &'static str) {
    increment_counter!("thera_distance_lookups_total", "result" => result);
}

pub fn increment_notification(result: &'static str) {
    increment_counter!("thera_notifications_total", "result" => result);
}

pub fn set_tracked_fingerprints(count: usize) {
    gauge!("thera_tracked_fingerprints", count as f64);
}

pub fn set_distance_cache_size(count: usize) {
    gauge!("thera_distance_cache_size", count as f64);
}
