//! Dispatch metrics recording helpers
//!
//! Thin wrappers over the `metrics` facade; call sites stay one-liners and
//! the metric names live in one place.

use metrics::{counter, gauge, histogram};

/// Record an item written into a dispatcher ingress queue.
pub fn record_item_written(dispatcher: &str) {
    counter!(
        "dispatch_items_written_total",
        "dispatcher" => dispatcher.to_string()
    )
    .increment(1);
}

/// Record one pump dispatch cycle and its fan-out width.
pub fn record_item_dispatched(consumer_count: usize) {
    counter!("dispatch_items_dispatched_total").increment(1);
    histogram!("dispatch_fanout_width").record(consumer_count as f64);
}

/// Record the depth of one consumer's egress queue.
pub fn record_egress_depth(consumer: &str, depth: usize) {
    gauge!(
        "dispatch_egress_depth",
        "consumer" => consumer.to_string()
    )
    .set(depth as f64);
}

/// Record an item claimed off a shared work queue.
pub fn record_item_claimed(worker: &str) {
    counter!(
        "dispatch_items_claimed_total",
        "worker" => worker.to_string()
    )
    .increment(1);
}

/// Record an operation unblocked by the shared cancellation signal.
pub fn record_cancellation(dispatcher: &str) {
    counter!(
        "dispatch_cancellations_total",
        "dispatcher" => dispatcher.to_string()
    )
    .increment(1);
}
