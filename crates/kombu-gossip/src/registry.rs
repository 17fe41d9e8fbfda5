//! Shared gossip node registry.
//!
//! Tracks every node that has ever registered. Entries are never removed:
//! marking a node inactive only excludes it from peer selection and
//! convergence checks, and a later registration reactivates it.

use kombu_clock::VectorClock;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// A node participating in gossip.
///
/// The clock is a shared reference, not a copy — several gossip wrappers
/// may point at the same clock instance, and a merge performed through one
/// wrapper is visible to all of them.
#[derive(Debug, Clone)]
pub struct GossipNode {
    /// Node id
    pub node_id: String,

    /// Advertised address
    pub address: String,

    /// Shared clock reference
    pub clock: Arc<VectorClock>,

    /// Last time this node took part in an exchange (or registered)
    pub last_seen: Instant,

    /// Whether the node is eligible for peer selection
    pub active: bool,
}

/// Thread-safe registry of gossip nodes.
#[derive(Default)]
pub struct NodeRegistry {
    /// All known nodes (id → node)
    nodes: RwLock<HashMap<String, GossipNode>>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, or refresh an existing registration.
    ///
    /// Idempotent upsert: re-registering an existing id refreshes its
    /// address, clock reference, last-seen time, and reactivates it.
    pub fn register(&self, node_id: &str, address: &str, clock: Arc<VectorClock>) {
        let mut nodes = self.nodes.write();
        let node = GossipNode {
            node_id: node_id.to_string(),
            address: address.to_string(),
            clock,
            last_seen: Instant::now(),
            active: true,
        };
        nodes.insert(node_id.to_string(), node);
        tracing::info!(node = node_id, address, "node registered for gossip");
    }

    /// Mark a node inactive.
    ///
    /// The record is retained so a later registration can reactivate it.
    pub fn mark_inactive(&self, node_id: &str) {
        if let Some(node) = self.nodes.write().get_mut(node_id) {
            node.active = false;
            tracing::warn!(node = node_id, "node marked inactive in gossip");
        }
    }

    /// Refresh a node's last-seen time.
    pub fn touch(&self, node_id: &str) {
        if let Some(node) = self.nodes.write().get_mut(node_id) {
            node.last_seen = Instant::now();
        }
    }

    /// Get a node by id.
    pub fn node(&self, node_id: &str) -> Option<GossipNode> {
        self.nodes.read().get(node_id).cloned()
    }

    /// Get all active nodes.
    pub fn active_nodes(&self) -> Vec<GossipNode> {
        self.nodes
            .read()
            .values()
            .filter(|n| n.active)
            .cloned()
            .collect()
    }

    /// Get the number of registered nodes, active or not.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}
