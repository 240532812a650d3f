//! # Integration Tests
//!
//! Cross-crate scenario tests for the dispatch substrate:
//! - broadcast fan-out with pooled reference counting
//! - shared-queue competing consumers under concurrent load
//! - cooperative cancellation across registered operators
//! - combined shared-queue → broadcast pipelines

#[cfg(test)]
mod fanout_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{ContractError, OperatorContext, PooledItem, Reusable};
    use dispatcher::{BroadcastConfig, BroadcastDispatcher, QueueCapacity};
    use tokio::sync::Semaphore;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> OperatorContext {
        OperatorContext::new(Arc::new(Semaphore::new(8)), CancellationToken::new())
    }

    fn pooled(label: char, released: &Arc<AtomicU64>) -> PooledItem<char> {
        let released = Arc::clone(released);
        PooledItem::with_release(
            label,
            Box::new(move || {
                released.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    /// Register consumers {1,2,3}; dispatch [A,B,C]; register consumer 4;
    /// dispatch [D]. Consumers 1-3 observe [A,B,C,D] in order; consumer 4
    /// observes only [D]. Every item goes back to the pool once fully
    /// released.
    #[tokio::test]
    async fn test_late_registration_snapshot_scenario() {
        let released = Arc::new(AtomicU64::new(0));
        let dispatcher = BroadcastDispatcher::from_config(
            &BroadcastConfig {
                ingress_capacity: QueueCapacity::Bounded(8),
            },
            ctx(),
        );

        let early: Vec<_> = (0..3).map(|_| dispatcher.register_consumer()).collect();

        for label in ['A', 'B', 'C'] {
            dispatcher.write(pooled(label, &released)).await.unwrap();
        }

        // Drain one early consumer first so every pre-registration dispatch
        // cycle has finished before consumer 4 appears.
        let mut observed = Vec::new();
        for _ in 0..3 {
            let item = early[0].recv().await.unwrap();
            observed.push(*item);
            item.remove_reference();
        }
        assert_eq!(observed, vec!['A', 'B', 'C']);

        let late = dispatcher.register_consumer();
        dispatcher.write(pooled('D', &released)).await.unwrap();
        dispatcher.dispose().await.unwrap();

        let item = early[0].recv().await.unwrap();
        assert_eq!(*item, 'D');
        item.remove_reference();

        for reader in &early[1..] {
            let mut seen = Vec::new();
            loop {
                match reader.recv().await {
                    Ok(item) => {
                        seen.push(*item);
                        item.remove_reference();
                    }
                    Err(ContractError::Closed) => break,
                    Err(other) => panic!("unexpected outcome: {other}"),
                }
            }
            assert_eq!(seen, vec!['A', 'B', 'C', 'D']);
        }

        let mut late_seen = Vec::new();
        loop {
            match late.recv().await {
                Ok(item) => {
                    late_seen.push(*item);
                    item.remove_reference();
                }
                Err(ContractError::Closed) => break,
                Err(other) => panic!("unexpected outcome: {other}"),
            }
        }
        assert_eq!(late_seen, vec!['D']);

        // A,B,C released after 3 removals each, D after 4.
        assert_eq!(released.load(Ordering::SeqCst), 4);
    }

    /// Reference counts after dispatch equal the snapshot size, and each
    /// pre-registered queue observes items in produce order.
    #[tokio::test]
    async fn test_fanout_reference_accounting() {
        let released = Arc::new(AtomicU64::new(0));
        let dispatcher = BroadcastDispatcher::from_config(&BroadcastConfig::default(), ctx());
        let readers: Vec<_> = (0..5).map(|_| dispatcher.register_consumer()).collect();

        let item = pooled('X', &released);
        dispatcher.write(item.clone()).await.unwrap();
        dispatcher.dispose().await.unwrap();

        for reader in &readers {
            let got = reader.recv().await.unwrap();
            assert_eq!(*got, 'X');
        }
        assert_eq!(item.reference_count(), 5);

        for _ in 0..5 {
            item.remove_reference();
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    /// Closing ingress and draining signals end-of-stream on every egress
    /// queue exactly once, then dispose returns.
    #[tokio::test]
    async fn test_drain_signals_every_egress_once() {
        let dispatcher: BroadcastDispatcher<PooledItem<u32>> =
            BroadcastDispatcher::from_config(&BroadcastConfig::default(), ctx());
        let readers: Vec<_> = (0..4).map(|_| dispatcher.register_consumer()).collect();

        dispatcher.write(PooledItem::new(1)).await.unwrap();
        let stats = tokio::time::timeout(Duration::from_secs(2), dispatcher.dispose())
            .await
            .expect("dispose should not hang")
            .unwrap()
            .unwrap();
        assert_eq!(stats.items, 1);
        assert_eq!(stats.deliveries, 4);

        for reader in &readers {
            assert!(reader.recv().await.is_ok());
            assert_eq!(reader.recv().await.unwrap_err(), ContractError::Closed);
            // End-of-stream stays terminal on repeated reads.
            assert_eq!(reader.recv().await.unwrap_err(), ContractError::Closed);
        }
    }
}

#[cfg(test)]
mod shared_queue_tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        ConsumerEndpoint, ContractError, OperatorContext, PooledItem, ProducerEndpoint,
        QueueReader, QueueWriter,
    };
    use dispatcher::{QueueCapacity, SharedQueueDispatcher};
    use tokio::sync::Semaphore;
    use tokio_util::sync::CancellationToken;

    struct Stage {
        writer: Option<QueueWriter<PooledItem<u64>>>,
        reader: Option<QueueReader<PooledItem<u64>>>,
    }

    impl Stage {
        fn new() -> Self {
            Self {
                writer: None,
                reader: None,
            }
        }
    }

    impl ProducerEndpoint<PooledItem<u64>> for Stage {
        fn bind_writer(&mut self, writer: QueueWriter<PooledItem<u64>>) {
            self.writer = Some(writer);
        }
    }

    impl ConsumerEndpoint<PooledItem<u64>> for Stage {
        fn bind_reader(&mut self, reader: QueueReader<PooledItem<u64>>) {
            self.reader = Some(reader);
        }
    }

    fn dispatcher(
        capacity: QueueCapacity,
    ) -> SharedQueueDispatcher<Stage, Stage, PooledItem<u64>> {
        let ctx = OperatorContext::new(Arc::new(Semaphore::new(8)), CancellationToken::new());
        SharedQueueDispatcher::with_capacity(capacity, ctx)
    }

    /// Two producers write 50 items each, three consumers drain concurrently:
    /// exactly 100 items received, none observed twice, none lost.
    #[tokio::test]
    async fn test_competing_consumers_exactly_once() {
        let mut dispatcher = dispatcher(QueueCapacity::Bounded(16));

        let mut producers = Vec::new();
        for p in 0..2u64 {
            let writer = dispatcher.register_producer(Stage::new());
            producers.push(tokio::spawn(async move {
                for i in 0..50u64 {
                    writer.send(PooledItem::new(p * 50 + i)).await.unwrap();
                }
            }));
        }

        let mut consumers = Vec::new();
        for _ in 0..3 {
            let reader = dispatcher.register_consumer(Stage::new());
            consumers.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                loop {
                    match reader.recv().await {
                        Ok(item) => claimed.push(*item),
                        Err(ContractError::Closed) => break,
                        Err(other) => panic!("unexpected outcome: {other}"),
                    }
                }
                claimed
            }));
        }

        for producer in producers {
            producer.await.unwrap();
        }
        dispatcher.dispose();

        let mut all = Vec::new();
        for consumer in consumers {
            let claimed = tokio::time::timeout(Duration::from_secs(5), consumer)
                .await
                .expect("consumers should drain")
                .unwrap();
            all.extend(claimed);
        }

        assert_eq!(all.len(), 100);
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), 100, "an item was claimed twice");
        assert_eq!(unique, (0..100).collect::<HashSet<_>>());
    }

    /// Firing the shared signal unblocks every writer suspended on a full
    /// queue, as a distinguishable cancelled outcome, without corrupting the
    /// queued items.
    #[tokio::test]
    async fn test_cancellation_unblocks_blocked_writers() {
        let mut dispatcher = dispatcher(QueueCapacity::Bounded(1));

        // Fill the queue so every further write suspends.
        let writer = dispatcher.register_producer(Stage::new());
        writer.send(PooledItem::new(0)).await.unwrap();

        let mut blocked = Vec::new();
        for p in 0..3u64 {
            let writer = dispatcher.register_producer(Stage::new());
            blocked.push(tokio::spawn(async move {
                writer.send(PooledItem::new(100 + p)).await
            }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        dispatcher.context().cancellation().cancel();

        for task in blocked {
            let outcome = tokio::time::timeout(Duration::from_secs(2), task)
                .await
                .expect("cancellation should unblock every writer")
                .unwrap();
            assert_eq!(outcome.unwrap_err(), ContractError::Cancelled);
        }

        // The item already queued is never retracted.
        assert_eq!(dispatcher.reader().len(), 1);
    }

    /// Firing the shared signal unblocks every reader suspended on an empty
    /// queue.
    #[tokio::test]
    async fn test_cancellation_unblocks_blocked_readers() {
        let mut dispatcher = dispatcher(QueueCapacity::Unbounded);

        let mut blocked = Vec::new();
        for _ in 0..3 {
            let reader = dispatcher.register_consumer(Stage::new());
            blocked.push(tokio::spawn(async move { reader.recv().await }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        dispatcher.context().cancellation().cancel();

        for task in blocked {
            let outcome = tokio::time::timeout(Duration::from_secs(2), task)
                .await
                .expect("cancellation should unblock every reader")
                .unwrap();
            assert_eq!(outcome.unwrap_err(), ContractError::Cancelled);
        }
    }
}

#[cfg(test)]
mod pipeline_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::BytesMut;
    use contracts::{ContractError, OperatorContext, PooledItem, Reusable};
    use dispatcher::{BroadcastConfig, BroadcastDispatcher, QueueCapacity, SharedQueueDispatcher};
    use dispatcher::{ConsumerEndpoint, ProducerEndpoint, QueueReader, QueueWriter};
    use tokio::sync::Semaphore;
    use tokio_util::sync::CancellationToken;

    type Buffer = PooledItem<BytesMut>;

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

    fn ctx() -> OperatorContext {
        OperatorContext::new(Arc::new(Semaphore::new(8)), CancellationToken::new())
    }

    /// Shared-queue workers forward claimed buffers into a downstream
    /// broadcast stage: every buffer reaches both subscribers exactly once
    /// and returns to the pool after all references drop.
    #[tokio::test]
    async fn test_shared_queue_feeds_broadcast_stage() {
        const BUFFERS: u64 = 40;

        let released = Arc::new(AtomicU64::new(0));
        let mut work_queue: SharedQueueDispatcher<Stage, Stage, Buffer> =
            SharedQueueDispatcher::with_capacity(QueueCapacity::Bounded(8), ctx());
        let broadcast = Arc::new(BroadcastDispatcher::<Buffer>::from_config(
            &BroadcastConfig::default(),
            ctx(),
        ));

        let mut subscribers = Vec::new();
        for _ in 0..2 {
            let reader = broadcast.register_consumer();
            subscribers.push(tokio::spawn(async move {
                let mut total = 0u64;
                loop {
                    match reader.recv().await {
                        Ok(buffer) => {
                            total += buffer.len() as u64;
                            buffer.remove_reference();
                        }
                        Err(ContractError::Closed) => break,
                        Err(other) => panic!("unexpected outcome: {other}"),
                    }
                }
                total
            }));
        }

        let mut workers = Vec::new();
        for _ in 0..3 {
            let reader = work_queue.register_consumer(Stage::new());
            let broadcast = Arc::clone(&broadcast);
            workers.push(tokio::spawn(async move {
                loop {
                    match reader.recv().await {
                        Ok(buffer) => broadcast.write(buffer).await.unwrap(),
                        Err(ContractError::Closed) => break,
                        Err(other) => panic!("unexpected outcome: {other}"),
                    }
                }
            }));
        }

        let writer = work_queue.register_producer(Stage::new());
        for i in 0..BUFFERS {
            let released = Arc::clone(&released);
            let buffer = PooledItem::with_release(
                BytesMut::from(&[i as u8; 16][..]),
                Box::new(move || {
                    released.fetch_add(1, Ordering::SeqCst);
                }),
            );
            writer.send(buffer).await.unwrap();
        }

        work_queue.dispose();
        for worker in workers {
            tokio::time::timeout(Duration::from_secs(5), worker)
                .await
                .expect("workers should drain")
                .unwrap();
        }
        broadcast.dispose().await.unwrap();

        let mut totals = Vec::new();
        for subscriber in subscribers {
            totals.push(
                tokio::time::timeout(Duration::from_secs(5), subscriber)
                    .await
                    .expect("subscribers should drain")
                    .unwrap(),
            );
        }
        // Each subscriber saw every buffer once.
        assert_eq!(totals, vec![BUFFERS * 16, BUFFERS * 16]);
        // Both subscribers released their references, so every buffer went
        // back to the pool.
        assert_eq!(released.load(Ordering::SeqCst), BUFFERS);
    }
}
