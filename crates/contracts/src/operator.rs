//! Operator context - shared throttle and cancellation for dispatch operators
//!
//! Every producer or consumer registered with a dispatcher holds exactly one
//! context scoped to that dispatcher: a shared counting semaphore for
//! coordination/throttling and a cancellation token derived from the
//! dispatcher's shared source. Cancellation is cooperative — suspended calls
//! race the token and unwind with [`ContractError::Cancelled`].

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::ContractError;

/// Throttle + cancellation pair carried by a registered operator.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl OperatorContext {
    /// Create a context from a caller-owned semaphore and cancellation source.
    pub fn new(semaphore: Arc<Semaphore>, cancel: CancellationToken) -> Self {
        Self { semaphore, cancel }
    }

    /// Derive a per-operator context: same semaphore, child token.
    ///
    /// Cancelling the parent cancels every child; a child cancelled on its
    /// own leaves siblings running.
    pub fn child(&self) -> Self {
        Self {
            semaphore: Arc::clone(&self.semaphore),
            cancel: self.cancel.child_token(),
        }
    }

    /// The shared throttle semaphore.
    pub fn semaphore(&self) -> &Arc<Semaphore> {
        &self.semaphore
    }

    /// The operator's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// True once the shared signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Suspends until the shared signal fires.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Acquire one throttle permit, racing the cancellation signal.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ContractError> {
        tokio::select! {
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map_err(|_| ContractError::Closed)
            }
            _ = self.cancel.cancelled() => Err(ContractError::Cancelled),
        }
    }
}
