//! Metrics emitted by OnePass.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `onepass_pass_decode_total{outcome}` - QR decodes by outcome (ok, rejected)
//! - `onepass_feed_recalculations_total{mode}` - Feed recomputations by mode (main, favorites)
//! - `onepass_feed_refresh_total{outcome}` - Manual refreshes by outcome (ok, error, timeout)
//! - `onepass_store_effects_total{type}` - Effects started by the store runtime
//! - `onepass_store_effects_cancelled_total` - Effects aborted or superseded
//!
//! ## Gauges
//! - `onepass_feed_results` - Size of the last computed feed
//!
//! ## Histograms
//! - `onepass_feed_refresh_duration_seconds` - Wall time of manual refreshes
//!
//! No recorder is installed here; the embedding application chooses one.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register descriptions for every metric.
///
/// Call once at startup, before any metrics are recorded.
pub fn register_metrics() {
    describe_counter!(
        "onepass_pass_decode_total",
        "QR token decodes by outcome (ok, rejected)"
    );

    describe_counter!(
        "onepass_feed_recalculations_total",
        "Feed recomputations by mode (main, favorites)"
    );
    describe_counter!(
        "onepass_feed_refresh_total",
        "Manual refreshes by outcome (ok, error, timeout)"
    );
    describe_gauge!("onepass_feed_results", "Number of events in the last computed feed");
    describe_histogram!(
        "onepass_feed_refresh_duration_seconds",
        "Wall time of manual refreshes, including the minimum display floor"
    );

    describe_counter!(
        "onepass_store_effects_total",
        "Effects started by the store runtime by type"
    );
    describe_counter!(
        "onepass_store_effects_cancelled_total",
        "Effects aborted by cancellation or superseded by a newer one"
    );

    tracing::debug!("OnePass metrics registered");
}
