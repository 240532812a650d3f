//! BroadcastDispatcher - fan-out pump over one ingress queue
//!
//! One background pump per instance copies every ingress item into every
//! currently-registered egress queue, taking one reference per target. Egress
//! queues are unbounded: a consumer that never drains grows its queue without
//! limit — a deliberate memory-for-decoupling tradeoff, observable through
//! [`BroadcastDispatcher::metrics`].

use async_channel::{Receiver, Sender};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{
    ConsumerEndpoint, ContractError, OperatorContext, ProducerEndpoint, QueueReader, QueueWriter,
    Reusable,
};

use crate::config::{channel_for, BroadcastConfig};
use crate::egress::{ConsumerId, EgressRegistry};
use crate::error::DispatcherError;
use crate::metrics::EgressSnapshot;

/// Totals reported by the pump when it exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct PumpStats {
    /// Items read from ingress
    pub items: u64,
    /// Item deliveries summed across egress queues
    pub deliveries: u64,
    /// True if the pump exited on the shared cancellation signal
    pub cancelled: bool,
}

/// Fan-out dispatcher: one ingress queue, N egress queues, one pump.
pub struct BroadcastDispatcher<T> {
    ingress_tx: Sender<T>,
    registry: Arc<EgressRegistry<T>>,
    ctx: OperatorContext,
    pump: Mutex<Option<JoinHandle<PumpStats>>>,
}

impl<T> BroadcastDispatcher<T>
where
    T: Reusable + Clone + Send + 'static,
{
    /// Take ownership of a pre-existing ingress queue and start the pump.
    ///
    /// Exactly one pump is bound to this instance; the ingress pair decides
    /// bounded vs. unbounded producer backpressure. The cancellation source
    /// and throttle semaphore inside `ctx` are caller-owned and threaded
    /// through to every registered operator.
    pub fn new(ingress_tx: Sender<T>, ingress_rx: Receiver<T>, ctx: OperatorContext) -> Self {
        let registry = Arc::new(EgressRegistry::new());
        let pump = tokio::spawn(pump_loop(ingress_rx, Arc::clone(&registry), ctx.clone()));
        Self {
            ingress_tx,
            registry,
            ctx,
            pump: Mutex::new(Some(pump)),
        }
    }

    /// Build the ingress queue from config, then start as in [`Self::new`].
    pub fn from_config(config: &BroadcastConfig, ctx: OperatorContext) -> Self {
        let (tx, rx) = channel_for(config.ingress_capacity);
        Self::new(tx, rx, ctx)
    }

    /// Allocate a fresh unbounded egress queue and return its read end.
    ///
    /// Callable at any time, concurrently with the pump; the new queue is
    /// guaranteed visibility from the next dispatch cycle, never
    /// retroactively.
    pub fn register_consumer(&self) -> QueueReader<T> {
        let (tx, rx) = async_channel::unbounded();
        let id = self.registry.insert(tx);
        debug!(%id, consumers = self.registry.len(), "broadcast consumer registered");
        QueueReader::new(rx, self.ctx.child())
    }

    /// Register a consumer role object, binding its read endpoint.
    pub fn register_consumer_with<C: ConsumerEndpoint<T>>(&self, consumer: &mut C) -> QueueReader<T> {
        let reader = self.register_consumer();
        consumer.bind_reader(reader.clone());
        reader
    }

    /// Hand a producer the ingress write end with a derived context.
    pub fn ingress_writer(&self) -> QueueWriter<T> {
        QueueWriter::new(self.ingress_tx.clone(), self.ctx.child())
    }

    /// Register a producer role object, binding its write endpoint.
    pub fn register_producer_with<P: ProducerEndpoint<T>>(&self, producer: &mut P) -> QueueWriter<T> {
        let writer = self.ingress_writer();
        producer.bind_writer(writer.clone());
        writer
    }

    /// Enqueue one item into ingress.
    ///
    /// Suspends only while a bounded ingress is full; resumes on space, on
    /// cancellation, or with [`DispatcherError::IngressClosed`] after
    /// disposal.
    pub async fn write(&self, item: T) -> Result<(), DispatcherError> {
        tokio::select! {
            sent = self.ingress_tx.send(item) => {
                sent.map_err(|_| DispatcherError::IngressClosed)
            }
            _ = self.ctx.cancelled() => Err(ContractError::Cancelled.into()),
        }
    }

    /// Consumers currently registered.
    pub fn consumer_count(&self) -> usize {
        self.registry.len()
    }

    /// Per-consumer delivery/depth metrics.
    pub fn metrics(&self) -> Vec<(ConsumerId, EgressSnapshot)> {
        self.registry.metrics()
    }

    /// The dispatcher's shared operator context.
    pub fn context(&self) -> &OperatorContext {
        &self.ctx
    }

    /// Close ingress and wait for the pump to drain and signal every egress
    /// queue.
    ///
    /// Idempotent: the second call returns `Ok(None)` without waiting. No
    /// internal timeout is imposed; callers needing a bound apply external
    /// cancellation. A pump panic surfaces here as
    /// [`DispatcherError::PumpPanicked`]; the shared token is cancelled so
    /// egress readers mid-drain unblock as cancelled instead of hanging.
    #[instrument(name = "broadcast_dispose", skip(self))]
    pub async fn dispose(&self) -> Result<Option<PumpStats>, DispatcherError> {
        self.ingress_tx.close();
        let handle = self.pump.lock().await.take();
        let Some(handle) = handle else {
            return Ok(None);
        };

        match handle.await {
            Ok(stats) => {
                info!(
                    items = stats.items,
                    deliveries = stats.deliveries,
                    cancelled = stats.cancelled,
                    "broadcast dispatcher disposed"
                );
                Ok(Some(stats))
            }
            Err(join_err) => {
                self.ctx.cancellation().cancel();
                Err(DispatcherError::pump_panicked(join_err))
            }
        }
    }
}

/// Single pump bound to one dispatcher instance.
///
/// Per item: snapshot the registry, take one reference per snapshot target
/// before the first handoff, then deliver the same shallow handle to every
/// target in produce order. An item read while no consumer is registered is
/// dropped with its count untouched.
#[instrument(name = "broadcast_pump", skip_all)]
async fn pump_loop<T: Reusable + Clone>(
    ingress: Receiver<T>,
    registry: Arc<EgressRegistry<T>>,
    ctx: OperatorContext,
) -> PumpStats {
    debug!("dispatch pump started");
    let mut stats = PumpStats::default();

    loop {
        let item = tokio::select! {
            item = ingress.recv() => match item {
                Ok(item) => item,
                // Ingress closed and fully drained.
                Err(_) => break,
            },
            _ = ctx.cancelled() => {
                stats.cancelled = true;
                debug!(items = stats.items, "dispatch pump cancelled");
                return stats;
            }
        };
        stats.items += 1;

        let snapshot = registry.snapshot();
        for _ in &snapshot {
            item.add_reference();
        }
        for handle in &snapshot {
            if handle.deliver(item.clone()) {
                stats.deliveries += 1;
            } else {
                // Reader dropped: give back its reference, unregister, keep
                // pumping for the others.
                item.remove_reference();
                registry.remove(handle.id());
            }
        }

        if stats.items % 100 == 0 {
            debug!(items = stats.items, "dispatch pump progress");
        }
    }

    // Terminal transition: end-of-stream on every registered egress queue.
    registry.complete_all();
    info!(
        items = stats.items,
        deliveries = stats.deliveries,
        "dispatch pump completed"
    );
    stats
}
