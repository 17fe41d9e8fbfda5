//! Logical clocks for causal ordering across nodes.
//!
//! Two variants:
//!
//! - [`VectorClock`]: per-node counter vector with pointwise-max merge.
//!   Captures partial causal ordering; supports a single-slot
//!   save/rollback used to undo tentatively-clocked operations.
//! - [`LamportClock`]: single scalar timestamp with the classic
//!   `max(local, received) + 1` receive rule.
//!
//! Both clocks use interior locking so one instance can be shared via
//! `Arc` by several holders (gossip wrappers, the sync service) with
//! mutations visible to all of them.

pub mod lamport;
pub mod vector;

pub use lamport::LamportClock;
pub use vector::VectorClock;

use std::collections::HashMap;

/// An immutable copy of a vector clock's counters, keyed by node id.
///
/// This is the shape carried on every clocked request and response.
pub type ClockSnapshot = HashMap<String, u64>;
