//! Metrics sink for shard map observability.
//!
//! The routing layer reports a handful of events; the sink decides what to
//! do with them. The default sink discards everything.

use std::time::Duration;

/// Receiver for shard map events.
///
/// Every method has a no-op default so sinks implement only what they care
/// about. Implementations must be cheap: the sink is called from the update
/// pipeline and, for [`MetricsSink::lookup_uncovered`], the lookup path.
pub trait MetricsSink: Send + Sync {
    /// A rebuild published a new routing table.
    fn map_updated(&self, partitions: usize, elapsed: Duration) {
        let _ = (partitions, elapsed);
    }

    /// A rebuild failed and a retry was scheduled.
    fn map_update_failed(&self, code: &str) {
        let _ = code;
    }

    /// The reaper removed closed-partition entries.
    fn partitions_reaped(&self, count: usize) {
        let _ = count;
    }

    /// A lookup hit a hash not covered by the routing table.
    fn lookup_uncovered(&self) {}
}

/// Sink that discards every event; the construction default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}
