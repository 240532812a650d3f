//! Per-egress metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single egress queue
#[derive(Debug, Default)]
pub struct EgressMetrics {
    /// Items delivered into the queue by the pump
    delivered: AtomicU64,
    /// Current queue depth (items awaiting the consumer)
    depth: AtomicUsize,
}

impl EgressMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn set_depth(&self, depth: usize) {
        self.depth.store(depth, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of all counters
    pub fn snapshot(&self) -> EgressSnapshot {
        EgressSnapshot {
            delivered: self.delivered(),
            depth: self.depth(),
        }
    }
}

/// Snapshot of egress metrics (for reporting)
#[derive(Debug, Clone, Copy)]
pub struct EgressSnapshot {
    pub delivered: u64,
    pub depth: usize,
}
