//! Gossip-based epidemic clock dissemination.
//!
//! Each participating node runs an independent periodic loop. On every
//! tick it picks one other active peer uniformly at random and performs a
//! symmetric one-round push-pull: both sides merge the other's
//! pre-exchange clock snapshot. Repeated pairwise exchanges pull the whole
//! cluster toward a converged state; convergence is observable and
//! measurable.
//!
//! # Modules
//!
//! - [`config`]: tick interval, simulated network delay, convergence
//!   tolerances and measurement bounds.
//! - [`registry`]: shared node registry (id, address, shared clock
//!   reference, last-seen, active flag).
//! - [`convergence`]: the pairwise-difference convergence predicate and
//!   measurement outcome type.
//! - [`protocol`]: the gossip loop itself.

pub mod config;
pub mod convergence;
pub mod protocol;
pub mod registry;

pub use config::{ConfigError, GossipConfig};
pub use convergence::{converged, ConvergenceOutcome};
pub use protocol::GossipProtocol;
pub use registry::{GossipNode, NodeRegistry};
