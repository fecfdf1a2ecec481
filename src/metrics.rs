// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
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
    ($name:expr, $desc:expr) => {};
}

// Re-export macros for use in this module when observability is disabled
#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Initializes the descriptions for all the metrics in the SDK.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_counter!(
        "price_source_requests_total",
        "Calls made to each price source, labeled by outcome (ok, no_data, timeout, ...)."
    );
    describe_counter!("cache_hits_total", "Price cache lookups that returned a fresh entry.");
    describe_counter!(
        "cache_miss_total",
        "Price cache lookups that found nothing or a stale entry."
    );
    describe_histogram!(
        "price_resolve_duration_seconds",
        "Wall-clock time of a full resolve_many call (all passes)."
    );
    describe_gauge!(
        "price_resolve_missing",
        "Addresses left without a price by the last resolve_many call."
    );
}

pub fn record_source_outcome(source: &str, outcome: &'static str) {
    counter!(
        "price_source_requests_total",
        1,
        "source" => source.to_string(),
        "outcome" => outcome
    );
}

pub fn increment_cache_hit(cache_name: &str) {
    counter!("cache_hits_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_cache_miss(cache_name: &str) {
    counter!("cache_miss_total", 1, "cache" => cache_name.to_string());
}

pub fn record_resolve(duration: std::time::Duration, missing: usize) {
    histogram!("price_resolve_duration_seconds", duration.as_secs_f64());
    gauge!("price_resolve_missing", missing as f64);
}
