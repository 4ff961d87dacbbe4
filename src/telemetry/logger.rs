//! Structured-log telemetry sink.
//!
//! Grounded on the original's `metrics/metricslogger.go`: a per-trace map
//! accumulates metas as the chain walks tiers, and `summary` flattens them
//! into one log line per key before dropping the trace entry. The original
//! uses `sync.Map`; `dashmap` is the direct equivalent here.

use super::{Meta, Telemetry};
use dashmap::DashMap;
use std::collections::HashMap;

#[derive(Default)]
struct TraceState {
    chain_name: String,
    /// Metas grouped by key, in visit order — mirrors the original's
    /// `Metas map[string][]Meta`.
    by_key: HashMap<String, Vec<Meta>>,
}

/// Emits one `tracing::info!` line per key, per request, on `summary()`.
pub struct TelemetryLogger {
    traces: DashMap<String, TraceState>,
}

impl TelemetryLogger {
    pub fn new() -> Self {
        Self { traces: DashMap::new() }
    }
}

impl Default for TelemetryLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry for TelemetryLogger {
    fn start(&self, trace_id: &str, chain_name: &str) {
        self.traces.insert(
            trace_id.to_string(),
            TraceState { chain_name: chain_name.to_string(), by_key: HashMap::new() },
        );
    }

    fn add(&self, trace_id: &str, meta: Meta) {
        if let Some(mut state) = self.traces.get_mut(trace_id) {
            state.by_key.entry(meta.key.clone()).or_default().push(meta);
        }
    }

    fn summary(&self, trace_id: &str) {
        if let Some((_, state)) = self.traces.remove(trace_id) {
            for (key, metas) in &state.by_key {
                let mut line = format!(
                    "chain={} trace={} key={}",
                    state.chain_name, trace_id, key
                );
                for meta in metas {
                    line.push_str(&format!(
                        " {}={} {}_elapsed_ms={}",
                        meta.tier,
                        meta.kind.as_str(),
                        meta.tier,
                        meta.elapsed_ms
                    ));
                }
                tracing::info!(target: "multicache_metrics", "{}", line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MetaEvent;
    use std::time::Instant;

    #[test]
    fn summary_removes_trace_and_logs_per_key() {
        let logger = TelemetryLogger::new();
        logger.start("t1", "widgets");
        logger.add(
            "t1",
            Meta { tier: "local".into(), key: "k1".into(), kind: MetaEvent::Miss, elapsed_ms: 1 },
        );
        logger.add(
            "t1",
            Meta { tier: "remote".into(), key: "k1".into(), kind: MetaEvent::Hit, elapsed_ms: 2 },
        );
        assert!(logger.traces.contains_key("t1"));
        logger.summary("t1");
        assert!(!logger.traces.contains_key("t1"));
        let _ = Instant::now();
    }

    #[test]
    fn add_before_start_is_dropped_silently() {
        let logger = TelemetryLogger::new();
        logger.add(
            "unstarted",
            Meta { tier: "local".into(), key: "k".into(), kind: MetaEvent::Miss, elapsed_ms: 0 },
        );
        assert!(!logger.traces.contains_key("unstarted"));
    }
}
