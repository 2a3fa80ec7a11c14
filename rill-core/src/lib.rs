//! Rill Core - strongly-typed partition model for the Rill stream producer.
//!
//! This crate defines the data model shared between the routing layer and
//! directory-service adapters: partition identifiers (with the directory
//! service's wire codec), 128-bit hash-key ranges, and partition descriptors.
//! It performs no I/O and has no async surface.
//!
//! # Design Principles (`TigerStyle`)
//!
//! - **Strongly-typed IDs**: a `PartitionId` is never a bare `u64`
//! - **Explicit invariants**: ranges are validated at construction
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod types;

pub use types::{
    HashRange, ParsePartitionIdError, PartitionDescriptor, PartitionId, SequenceNumberRange,
};
