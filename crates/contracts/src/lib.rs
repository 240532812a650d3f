//! # Contracts
//!
//! Frozen interface contracts (ICD), defining the capabilities shared by every
//! crate in the workspace. All business crates can only depend on this crate,
//! reverse dependencies are prohibited.
//!
//! ## Capabilities
//! - [`Reusable`]: reference-counted lifetime for pooled items flowing through
//!   a dispatcher
//! - [`OperatorContext`]: throttle semaphore + cooperative cancellation carried
//!   by every registered producer/consumer
//! - [`QueueWriter`] / [`QueueReader`]: cancellation-aware queue endpoints
//! - [`ProducerEndpoint`] / [`ConsumerEndpoint`]: binding points a dispatcher
//!   populates at registration

mod endpoint;
mod error;
mod operator;
mod reusable;

pub use endpoint::{ConsumerEndpoint, ProducerEndpoint, QueueReader, QueueWriter};
pub use error::ContractError;
pub use operator::OperatorContext;
pub use reusable::{PooledItem, ReleaseFn, Reusable};
