//! End-to-end pipeline demo
//!
//! Pooled byte buffers flow through both dispatch topologies:
//! producer → shared work queue (competing workers) → broadcast fan-out →
//! two subscribers. The pool is modeled by the shared throttle semaphore:
//! one permit per in-flight buffer, given back by the release hook when the
//! last reference drops.
//!
//! Run with: `cargo run -p demos --bin pipeline`

use std::sync::Arc;

use anyhow::Result;
use bytes::BytesMut;
use contracts::{ContractError, OperatorContext, PooledItem, Reusable};
use dispatcher::{
    BroadcastConfig, BroadcastDispatcher, ConsumerEndpoint, ProducerEndpoint, QueueCapacity,
    QueueReader, QueueWriter, SharedQueueDispatcher,
};
use observability::{LogFormat, ObservabilityConfig};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

type Buffer = PooledItem<BytesMut>;

/// Minimal role object: bindable at either end of a dispatcher.
struct Stage {
    writer: Option<QueueWriter<Buffer>>,
    reader: Option<QueueReader<Buffer>>,
}

impl Stage {
    fn new() -> Self {
        Self {
            writer: None,
            reader: None,
        }
    }
}

impl ProducerEndpoint<Buffer> for Stage {
    fn bind_writer(&mut self, writer: QueueWriter<Buffer>) {
        self.writer = Some(writer);
    }
}

impl ConsumerEndpoint<Buffer> for Stage {
    fn bind_reader(&mut self, reader: QueueReader<Buffer>) {
        self.reader = Some(reader);
    }
}

const POOL_PERMITS: usize = 8;
const FRAME_COUNT: u64 = 32;
const FRAME_SIZE: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_with_config(ObservabilityConfig {
        log_format: LogFormat::Pretty,
        metrics_port: None,
        default_log_level: "info".to_string(),
    })?;

    let semaphore = Arc::new(Semaphore::new(POOL_PERMITS));
    let ctx = OperatorContext::new(Arc::clone(&semaphore), CancellationToken::new());

    let mut work_queue: SharedQueueDispatcher<Stage, Stage, Buffer> =
        SharedQueueDispatcher::with_capacity(QueueCapacity::Bounded(4), ctx.child());
    let broadcast = Arc::new(BroadcastDispatcher::<Buffer>::from_config(
        &BroadcastConfig {
            ingress_capacity: QueueCapacity::Bounded(4),
        },
        ctx.child(),
    ));

    // Fan-out subscribers: one logs, one checksums.
    let log_reader = broadcast.register_consumer();
    let log_subscriber = tokio::spawn(async move {
        let mut frames = 0u64;
        loop {
            match log_reader.recv().await {
                Ok(buffer) => {
                    frames += 1;
                    info!(len = buffer.len(), frames, "frame observed");
                    buffer.remove_reference();
                }
                Err(ContractError::Closed) => break,
                Err(ContractError::Cancelled) => break,
            }
        }
        frames
    });

    let sum_reader = broadcast.register_consumer();
    let sum_subscriber = tokio::spawn(async move {
        let mut checksum = 0u64;
        loop {
            match sum_reader.recv().await {
                Ok(buffer) => {
                    checksum += buffer.iter().map(|b| *b as u64).sum::<u64>();
                    buffer.remove_reference();
                }
                Err(ContractError::Closed) => break,
                Err(ContractError::Cancelled) => break,
            }
        }
        checksum
    });

    // Competing workers: claim a buffer, forward it downstream.
    let mut workers = Vec::new();
    for worker_id in 0..3 {
        let reader = work_queue.register_consumer(Stage::new());
        let broadcast = Arc::clone(&broadcast);
        workers.push(tokio::spawn(async move {
            let worker = format!("worker-{worker_id}");
            loop {
                match reader.recv().await {
                    Ok(buffer) => {
                        observability::record_item_claimed(&worker);
                        if broadcast.write(buffer).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        }));
    }

    // Producer: one pool permit per in-flight buffer.
    let writer = work_queue.register_producer(Stage::new());
    for frame_id in 0..FRAME_COUNT {
        let permit = ctx.acquire().await?;
        permit.forget();

        let pool = Arc::clone(&semaphore);
        let buffer = PooledItem::with_release(
            BytesMut::from(&vec![frame_id as u8; FRAME_SIZE][..]),
            Box::new(move || pool.add_permits(1)),
        );
        writer.send(buffer).await?;
        observability::record_item_written("work-queue");
    }

    work_queue.dispose();
    for worker in workers {
        worker.await?;
    }
    let stats = broadcast.dispose().await?;

    let frames = log_subscriber.await?;
    let checksum = sum_subscriber.await?;
    info!(?stats, frames, checksum, "pipeline drained");

    // Every buffer came back to the pool.
    assert_eq!(semaphore.available_permits(), POOL_PERMITS);
    Ok(())
}
