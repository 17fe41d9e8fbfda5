//! Cluster-level coordination pieces: partition simulation, leader
//! election, and centralized clock synchronization.
//!
//! # Modules
//!
//! - [`partition`]: shared registry of unreachable nodes plus a random
//!   fault-injection loop for exercising CAP tradeoffs.
//! - [`election`]: file-persisted, last-writer-wins leader election. This
//!   is deliberately NOT a quorum-safe protocol — it demonstrates the
//!   problem, it does not solve it.
//! - [`sync`]: star-topology clock reconciliation — the centralized
//!   analogue of the peer-to-peer gossip exchange.

pub mod election;
pub mod partition;
pub mod sync;

pub use election::{ElectionError, LeaderElection, LeaderRecord};
pub use partition::{PartitionInjector, PartitionInjectorConfig, PartitionRegistry};
pub use sync::{ClockSyncService, SyncConfig};
