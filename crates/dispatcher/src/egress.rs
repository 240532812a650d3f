//! Egress handles and the consumer registry
//!
//! Each registered consumer owns a freshly allocated unbounded queue; the
//! pump holds the write end through an [`EgressHandle`]. The registry is
//! mutated by registration and enumerated by the pump, so it supports
//! snapshot-then-iterate: a dispatch cycle only sees registrations that
//! existed before the cycle began.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::sync::Arc;

use async_channel::{Sender, TrySendError};
use tracing::debug;

use crate::metrics::{EgressMetrics, EgressSnapshot};

/// Identity of a registered broadcast consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Write end of one consumer's egress queue, held by the pump.
pub(crate) struct EgressHandle<T> {
    id: ConsumerId,
    tx: Sender<T>,
    metrics: Arc<EgressMetrics>,
}

impl<T> EgressHandle<T> {
    pub(crate) fn id(&self) -> ConsumerId {
        self.id
    }

    /// Deliver one item. Returns false if the consumer dropped its reader.
    pub(crate) fn deliver(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => {
                self.metrics.inc_delivered();
                self.metrics.set_depth(self.tx.len());
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(id = %self.id, "egress reader dropped");
                false
            }
            // Egress queues are constructed unbounded; a Full here is a bug.
            Err(TrySendError::Full(_)) => unreachable!("egress queues are unbounded"),
        }
    }

    /// Signal end-of-stream to the consumer.
    pub(crate) fn complete(&self) {
        self.tx.close();
    }
}

impl<T> Clone for EgressHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Registry of egress queues, safe for concurrent mutation-while-iteration.
pub(crate) struct EgressRegistry<T> {
    entries: Mutex<Vec<EgressHandle<T>>>,
    next_id: AtomicU64,
}

impl<T> EgressRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Store a fresh egress write end under a new identity.
    pub(crate) fn insert(&self, tx: Sender<T>) -> ConsumerId {
        let id = ConsumerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = EgressHandle {
            id,
            tx,
            metrics: Arc::new(EgressMetrics::new()),
        };
        self.entries.lock().expect("egress registry poisoned").push(handle);
        id
    }

    pub(crate) fn remove(&self, id: ConsumerId) {
        self.entries
            .lock()
            .expect("egress registry poisoned")
            .retain(|h| h.id != id);
    }

    /// Point-in-time copy of the current membership.
    pub(crate) fn snapshot(&self) -> Vec<EgressHandle<T>> {
        self.entries.lock().expect("egress registry poisoned").clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().expect("egress registry poisoned").len()
    }

    /// Signal end-of-stream on every registered queue exactly once.
    pub(crate) fn complete_all(&self) {
        let drained: Vec<_> = self
            .entries
            .lock()
            .expect("egress registry poisoned")
            .drain(..)
            .collect();
        for handle in &drained {
            handle.complete();
        }
    }

    /// Current metrics per registered consumer.
    pub(crate) fn metrics(&self) -> Vec<(ConsumerId, EgressSnapshot)> {
        self.entries
            .lock()
            .expect("egress registry poisoned")
            .iter()
            .map(|h| (h.id, h.metrics.snapshot()))
            .collect()
    }
}
