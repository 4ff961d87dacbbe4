//! Per-request telemetry: trace context, tier visit events, and the two
//! sink implementations (structured-log summary, metrics counters).

mod logger;
mod metrics_sink;

pub use logger::TelemetryLogger;
pub use metrics_sink::TelemetryMetrics;

use std::sync::Arc;
use std::time::Instant;

/// What happened when an adaptor was visited during a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaEvent {
    Hit,
    Miss,
    Set,
}

impl MetaEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetaEvent::Hit => "hit",
            MetaEvent::Miss => "miss",
            MetaEvent::Set => "set",
        }
    }
}

/// One tier-visit record: which tier, which key, what happened, how long
/// it took.
#[derive(Debug, Clone)]
pub struct Meta {
    pub tier: String,
    pub key: String,
    pub kind: MetaEvent,
    pub elapsed_ms: u64,
}

/// Sink for per-request telemetry. `TelemetryLogger` buffers metas per
/// trace and emits one log line per key at `summary()`; `TelemetryMetrics`
/// streams `add` straight into counters/histograms and treats `start`/
/// `summary` as no-ops. Both are `Send + Sync` so a chain can hold either
/// behind an `Arc<dyn Telemetry>`.
pub trait Telemetry: Send + Sync {
    /// Begin buffering for a new trace. Idempotent if called twice for the
    /// same trace id (the second call simply resets the buffer).
    fn start(&self, trace_id: &str, chain_name: &str);

    /// Record one tier visit for the current trace.
    fn add(&self, trace_id: &str, meta: Meta);

    /// Flush and release whatever state `start` accumulated for this trace.
    fn summary(&self, trace_id: &str);
}

/// Request-scoped state threaded through a chain call: which trace this is,
/// and where to send telemetry. Passed by `&mut` rather than carried in
/// thread-local/global state, since many requests run concurrently.
pub struct TraceContext {
    pub trace_id: String,
    pub chain_name: String,
    pub sink: Arc<dyn Telemetry>,
}

impl TraceContext {
    pub fn new(chain_name: impl Into<String>, sink: Arc<dyn Telemetry>) -> Self {
        let trace_id = crate::utils::new_trace_id();
        let chain_name = chain_name.into();
        sink.start(&trace_id, &chain_name);
        Self { trace_id, chain_name, sink }
    }

    pub fn record(&self, tier: &str, key: &str, kind: MetaEvent, started: Instant) {
        self.sink.add(
            &self.trace_id,
            Meta {
                tier: tier.to_string(),
                key: key.to_string(),
                kind,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        );
    }

    pub fn finish(&self) {
        self.sink.summary(&self.trace_id);
    }
}
