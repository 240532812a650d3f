//! Construction-time queue configuration

use async_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Capacity of a dispatch queue, chosen at construction time.
///
/// Bounded ingress applies backpressure to producers; unbounded trades memory
/// for decoupling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueCapacity {
    /// Never blocks writers; grows without limit.
    #[default]
    Unbounded,
    /// Writers suspend once this many items are queued.
    Bounded(usize),
}

/// Build a channel pair for the given capacity.
pub fn channel_for<T>(capacity: QueueCapacity) -> (Sender<T>, Receiver<T>) {
    match capacity {
        QueueCapacity::Unbounded => async_channel::unbounded(),
        QueueCapacity::Bounded(n) => async_channel::bounded(n),
    }
}

/// Broadcast dispatcher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Ingress queue capacity (egress queues are always unbounded).
    #[serde(default)]
    pub ingress_capacity: QueueCapacity,
}
