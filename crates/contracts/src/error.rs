//! Contract-level error definitions

use thiserror::Error;

/// Outcomes shared by every queue endpoint.
///
/// `Cancelled` is an expected outcome, not a failure: callers unblocked by the
/// shared cancellation signal must be able to tell it apart from success and
/// from end-of-stream, and must never report it as either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The operation was unblocked by the shared cancellation signal.
    #[error("operation cancelled")]
    Cancelled,

    /// The queue is closed and fully drained (end of stream).
    #[error("queue closed")]
    Closed,
}

impl ContractError {
    /// True if this outcome is a cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True if this outcome is end-of-stream.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
