//! SharedQueueDispatcher - competing-consumers membership registry
//!
//! Binds N producers and M consumers to one shared MPMC queue: all producers
//! share the write end, all consumers share the read end, and whichever
//! consumer next receives claims the next item. No pump, no fan-out, no
//! reference counting — just membership bookkeeping and a shared cancellation
//! source. The item type still satisfies [`Reusable`] because a consumer
//! attached here may forward items into a broadcast stage downstream.

use async_channel::{Receiver, Sender};
use tracing::{debug, info};

use contracts::{
    ConsumerEndpoint, OperatorContext, ProducerEndpoint, QueueReader, QueueWriter, Reusable,
};

use crate::config::{channel_for, QueueCapacity};

/// Work-sharing dispatcher over one shared queue.
pub struct SharedQueueDispatcher<P, C, T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    producers: Vec<P>,
    consumers: Vec<C>,
    ctx: OperatorContext,
}

impl<P, C, T> SharedQueueDispatcher<P, C, T>
where
    P: ProducerEndpoint<T>,
    C: ConsumerEndpoint<T>,
    T: Reusable,
{
    /// Wrap a pre-existing queue. Registers no background task; concurrency
    /// is bounded only by how many callers drive the shared ends.
    pub fn new(tx: Sender<T>, rx: Receiver<T>, ctx: OperatorContext) -> Self {
        Self {
            tx,
            rx,
            producers: Vec::new(),
            consumers: Vec::new(),
            ctx,
        }
    }

    /// Build the shared queue for the given capacity, then wrap it.
    pub fn with_capacity(capacity: QueueCapacity, ctx: OperatorContext) -> Self {
        let (tx, rx) = channel_for(capacity);
        Self::new(tx, rx, ctx)
    }

    /// The shared write end with a derived operator context.
    pub fn writer(&self) -> QueueWriter<T> {
        QueueWriter::new(self.tx.clone(), self.ctx.child())
    }

    /// The shared read end with a derived operator context.
    pub fn reader(&self) -> QueueReader<T> {
        QueueReader::new(self.rx.clone(), self.ctx.child())
    }

    /// Bind `producer`'s output endpoint to the shared write end and add it
    /// to membership. The dispatcher does not proxy or intercept writes.
    pub fn register_producer(&mut self, mut producer: P) -> QueueWriter<T> {
        let writer = self.writer();
        producer.bind_writer(writer.clone());
        self.producers.push(producer);
        debug!(producers = self.producers.len(), "shared-queue producer registered");
        writer
    }

    /// Bind `consumer`'s input endpoint to the shared read end and add it to
    /// membership. Delivery is competing-consumers: no per-consumer ordering
    /// beyond the queue's own total order.
    pub fn register_consumer(&mut self, mut consumer: C) -> QueueReader<T> {
        let reader = self.reader();
        consumer.bind_reader(reader.clone());
        self.consumers.push(consumer);
        debug!(consumers = self.consumers.len(), "shared-queue consumer registered");
        reader
    }

    /// Wipe-and-replace producer membership from an immutable snapshot.
    /// Full replace, never an incremental merge.
    pub fn reconfigure_producers(&mut self, producers: Vec<P>) {
        self.producers.clear();
        for producer in producers {
            self.register_producer(producer);
        }
    }

    /// Wipe-and-replace consumer membership from an immutable snapshot.
    pub fn reconfigure_consumers(&mut self, consumers: Vec<C>) {
        self.consumers.clear();
        for consumer in consumers {
            self.register_consumer(consumer);
        }
    }

    /// Registered producers.
    pub fn producers(&self) -> &[P] {
        &self.producers
    }

    /// Registered consumers.
    pub fn consumers(&self) -> &[C] {
        &self.consumers
    }

    /// The dispatcher's shared operator context. Cancelling its token
    /// cooperatively unblocks every pending read/write across every member
    /// without corrupting queue state.
    pub fn context(&self) -> &OperatorContext {
        &self.ctx
    }

    /// Close the shared queue: writers fail fast, readers drain the
    /// remaining items then observe end-of-stream. Idempotent.
    pub fn dispose(&self) {
        if self.tx.close() {
            info!(
                producers = self.producers.len(),
                consumers = self.consumers.len(),
                "shared queue closed"
            );
        }
    }
}
