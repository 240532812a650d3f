//! # Dispatcher
//!
//! Channel dispatch engines for pooled items.
//!
//! Two multiplexing topologies:
//! - [`BroadcastDispatcher`]: fan-out — one ingress queue, one background
//!   pump, every registered consumer sees every item (reference-counted)
//! - [`SharedQueueDispatcher`]: work-sharing — one shared queue, competing
//!   consumers, each item claimed by exactly one consumer

pub mod broadcast;
pub mod config;
pub mod egress;
pub mod error;
pub mod metrics;
pub mod shared;

pub use contracts::{
    ConsumerEndpoint, ContractError, OperatorContext, PooledItem, ProducerEndpoint, QueueReader,
    QueueWriter, Reusable,
};

pub use broadcast::{BroadcastDispatcher, PumpStats};
pub use config::{channel_for, BroadcastConfig, QueueCapacity};
pub use egress::ConsumerId;
pub use error::DispatcherError;
pub use metrics::{EgressMetrics, EgressSnapshot};
pub use shared::SharedQueueDispatcher;
