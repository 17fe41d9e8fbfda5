//! kombu-calc: an arithmetic node that exists to exercise the
//! coordination primitives.
//!
//! The arithmetic itself (square/cube/multiply with an artificial delay)
//! is deliberately trivial; the interesting parts are what every request
//! passes through — vector-clock stamping with rollback on failure,
//! partition-aware rejection — and the background machinery each node
//! runs: gossip dissemination, cluster clock sync, random partition
//! injection, and startup leader election.

pub mod config;
pub mod lamport;
pub mod node;
pub mod service;
