//! Two-phase commit over a fixed participant list.
//!
//! The [`Coordinator`] drives a generated-id transaction through Prepare
//! and then Commit or Abort. Strict 2PC semantics: every participant must
//! vote yes in Prepare before anyone commits; a single no (or a failed
//! participant call, counted as a no) aborts everyone. Each phase is a
//! full barrier — there is no quorum shortcut and no per-participant
//! timeout, so a hung participant stalls the whole transaction.
//!
//! Participants are reached through the [`ParticipantTransport`] seam;
//! [`SimulatedTransport`] stands in for the network with injectable,
//! seedable fault behavior.

pub mod coordinator;
pub mod error;
pub mod transport;
pub mod types;

pub use coordinator::Coordinator;
pub use error::{CommitError, Result};
pub use transport::{ParticipantTransport, SimulatedTransport, SimulatedTransportConfig};
pub use types::{Operation, TxnPhase, TxnRequest, TxnResponse};
