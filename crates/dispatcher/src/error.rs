//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// The dispatch pump panicked; surfaced to whoever awaits disposal.
    #[error("dispatch pump panicked: {message}")]
    PumpPanicked { message: String },

    /// Write attempted against a closed ingress queue.
    #[error("ingress queue closed")]
    IngressClosed,

    /// Contract-level outcome (cancellation, end of stream).
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Wrap a pump join failure.
    pub fn pump_panicked(err: tokio::task::JoinError) -> Self {
        Self::PumpPanicked {
            message: err.to_string(),
        }
    }

    /// True if this outcome is a cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Contract(contracts::ContractError::Cancelled))
    }
}
