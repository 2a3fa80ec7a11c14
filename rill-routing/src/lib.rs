//! Rill Routing - producer-side shard routing for a partitioned stream.
//!
//! This crate keeps a live mapping from 128-bit partition-hash values to the
//! stream partition responsible for them, so a high-throughput producer can
//! route each record without a directory round-trip. The mapping is rebuilt
//! from the directory service on demand, with single-flight suppression and
//! backoff on failure, and reconciles the overlapping parent/child ranges
//! that coexist during a repartition.
//!
//! # Design (`TigerStyle`)
//!
//! - **Non-blocking lookups**: the hot path never waits on a rebuild
//! - **Degrade, never die**: every failure path ends in `None`, not a panic
//! - **Explicit lifecycles**: background tasks are owned and joined

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod backoff;
mod cache;
mod config;
mod directory;
mod metrics;
mod reconcile;
mod shard_map;
mod table;

pub use backoff::Backoff;
pub use cache::PartitionCache;
pub use config::{
    ShardMapConfig, CLOSED_PARTITION_TTL_MS_DEFAULT, UPDATE_BACKOFF_MAX_MS_DEFAULT,
    UPDATE_BACKOFF_MIN_MS_DEFAULT,
};
pub use directory::{
    DirectoryClient, DirectoryError, ListPartitionsRequest, PartitionPage, SimulatedDirectory,
    LIST_PARTITIONS_PAGE_LIMIT,
};
pub use metrics::{MetricsSink, NoopMetrics};
pub use reconcile::{reconcile, Reconciled};
pub use shard_map::{MapState, ShardMap};
pub use table::{RoutingEntry, RoutingTable};
