//! Queue endpoints and the capability traits dispatchers bind at registration
//!
//! Producer/consumer role objects are structural: anything exposing a settable
//! write endpoint is a producer, anything exposing a settable read endpoint is
//! a consumer. A dispatcher populates the endpoint at registration and threads
//! its shared cancellation source through it.

use async_channel::{Receiver, Sender};

use crate::{ContractError, OperatorContext};

/// Cancellation-aware write end of a dispatch queue.
pub struct QueueWriter<T> {
    tx: Sender<T>,
    ctx: OperatorContext,
}

impl<T> QueueWriter<T> {
    pub fn new(tx: Sender<T>, ctx: OperatorContext) -> Self {
        Self { tx, ctx }
    }

    /// The operator context threaded through this endpoint.
    pub fn context(&self) -> &OperatorContext {
        &self.ctx
    }

    /// Enqueue one item.
    ///
    /// Suspends only while the queue is bounded and full; resumes when space
    /// frees up, the queue closes ([`ContractError::Closed`]) or the shared
    /// signal fires ([`ContractError::Cancelled`]).
    pub async fn send(&self, item: T) -> Result<(), ContractError> {
        tokio::select! {
            sent = self.tx.send(item) => sent.map_err(|_| ContractError::Closed),
            _ = self.ctx.cancelled() => Err(ContractError::Cancelled),
        }
    }

    /// Close the queue to further writes. Returns false if already closed.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl<T> Clone for QueueWriter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

/// Cancellation-aware read end of a dispatch queue.
pub struct QueueReader<T> {
    rx: Receiver<T>,
    ctx: OperatorContext,
}

impl<T> QueueReader<T> {
    pub fn new(rx: Receiver<T>, ctx: OperatorContext) -> Self {
        Self { rx, ctx }
    }

    /// The operator context threaded through this endpoint.
    pub fn context(&self) -> &OperatorContext {
        &self.ctx
    }

    /// Receive the next item.
    ///
    /// Suspends while the queue is empty. A closed queue keeps yielding its
    /// remaining items; once drained every further call returns
    /// [`ContractError::Closed`] (end of stream). The shared signal unblocks
    /// a suspended call with [`ContractError::Cancelled`].
    pub async fn recv(&self) -> Result<T, ContractError> {
        tokio::select! {
            item = self.rx.recv() => item.map_err(|_| ContractError::Closed),
            _ = self.ctx.cancelled() => Err(ContractError::Cancelled),
        }
    }

    /// Items currently queued behind this reader.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Clone for QueueReader<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

/// Anything exposing a settable write endpoint; populated at registration.
pub trait ProducerEndpoint<T> {
    fn bind_writer(&mut self, writer: QueueWriter<T>);
}

/// Anything exposing a settable read endpoint; populated at registration.
pub trait ConsumerEndpoint<T> {
    fn bind_reader(&mut self, reader: QueueReader<T>);
}
