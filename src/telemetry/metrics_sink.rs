//! Counter/histogram telemetry sink.
//!
//! Grounded on the original's `metrics/metricsprometheus.go`, reimplemented
//! over the `metrics` facade crate (as used by `examples/setulabs-skp-cache`)
//! instead of hand-rolling Prometheus types. `start`/`summary` are no-ops
//! here — every `add` is pushed straight to the exported counter/histogram,
//! there is nothing to buffer per trace.

use super::{Meta, Telemetry};
use metrics::{counter, histogram};

/// Streams tier-visit events directly into `metrics` counters/histograms,
/// labeled by tier, key, and event kind.
pub struct TelemetryMetrics;

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry for TelemetryMetrics {
    fn start(&self, _trace_id: &str, _chain_name: &str) {}

    fn add(&self, _trace_id: &str, meta: Meta) {
        counter!(
            "multicache_requests_total",
            "tier" => meta.tier.clone(),
            "key" => meta.key.clone(),
            "kind" => meta.kind.as_str(),
        )
        .increment(1);

        if meta.elapsed_ms > 0 {
            histogram!(
                "multicache_tier_elapsed_ms",
                "tier" => meta.tier,
                "kind" => meta.kind.as_str(),
            )
            .record(meta.elapsed_ms as f64);
        }
    }

    fn summary(&self, _trace_id: &str) {}
}
