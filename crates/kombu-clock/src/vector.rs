//! Vector clock with pointwise-max merge and single-slot rollback.

use crate::ClockSnapshot;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

/// Guarded clock state. Counters and the rollback slot share one lock so
/// a save/rollback pair observes a consistent view.
struct ClockState {
    /// Counter per node id. Always contains the owning node's entry.
    counters: HashMap<String, u64>,

    /// Single rollback slot; a second save overwrites the previous one.
    saved: Option<HashMap<String, u64>>,
}

/// Per-node vector clock.
///
/// Only the owning node's entry is advanced by [`increment`]; all entries
/// may be raised (never lowered) by [`merge`]. Instances are typically
/// shared via `Arc` — every holder observes the same counters.
///
/// [`increment`]: VectorClock::increment
/// [`merge`]: VectorClock::merge
pub struct VectorClock {
    /// Owning node's id
    node_id: String,

    /// Guarded counters + rollback slot
    state: Mutex<ClockState>,
}

impl VectorClock {
    /// Create a clock owned by `node_id`, with the owning entry at 0.
    pub fn new(node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        let mut counters = HashMap::new();
        counters.insert(node_id.clone(), 0);

        Self {
            node_id,
            state: Mutex::new(ClockState {
                counters,
                saved: None,
            }),
        }
    }

    /// Get the owning node's id.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Record a local event: add 1 to the owning node's counter.
    pub fn increment(&self) {
        let mut state = self.state.lock();
        *state.counters.entry(self.node_id.clone()).or_insert(0) += 1;
        tracing::debug!(node = %self.node_id, clock = %render(&state.counters), "clock incremented");
    }

    /// Merge another clock's snapshot into this one.
    ///
    /// For every key in the union of both snapshots, the local counter is
    /// set to the maximum of the two. Commutative and idempotent; never
    /// decreases a counter.
    pub fn merge(&self, other: &ClockSnapshot) {
        let mut state = self.state.lock();
        for (node, &count) in other {
            let entry = state.counters.entry(node.clone()).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
        tracing::debug!(node = %self.node_id, clock = %render(&state.counters), "clock merged");
    }

    /// Save the current counters into the rollback slot.
    ///
    /// Overwrites any previously saved state.
    pub fn save_state(&self) {
        let mut state = self.state.lock();
        state.saved = Some(state.counters.clone());
    }

    /// Restore the counters saved by the last [`save_state`] call.
    ///
    /// A no-op when nothing has been saved. The slot is kept, so a second
    /// rollback restores the same state again.
    ///
    /// [`save_state`]: VectorClock::save_state
    pub fn rollback(&self) {
        let mut state = self.state.lock();
        if let Some(saved) = state.saved.clone() {
            state.counters = saved;
            tracing::warn!(node = %self.node_id, clock = %render(&state.counters), "clock rolled back");
        }
    }

    /// Get an owned copy of the counters, never a live alias.
    pub fn snapshot(&self) -> ClockSnapshot {
        self.state.lock().counters.clone()
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render(&self.state.lock().counters))
    }
}

impl fmt::Debug for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorClock")
            .field("node_id", &self.node_id)
            .field("counters", &self.state.lock().counters)
            .finish()
    }
}

/// Deterministic `id:count` rendering, sorted by node id.
fn render(counters: &HashMap<String, u64>) -> String {
    let mut entries: Vec<_> = counters.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .iter()
        .map(|(id, count)| format!("{}:{}", id, count))
        .collect::<Vec<_>>()
        .join(",")
}
