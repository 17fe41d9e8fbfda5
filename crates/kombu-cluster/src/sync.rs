//! Centralized clock synchronization.
//!
//! [`ClockSyncService`] keeps a registry of node clocks and periodically
//! reconciles them: a divergence check flags nodes that have not taken
//! part in a sync round recently, and a cluster sync computes the
//! pointwise maximum across every registered snapshot and pushes it back
//! into every clock. Same merge algebra as gossip, star topology instead
//! of random pairwise.

use kombu_clock::{ClockSnapshot, VectorClock};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::sleep;

/// Timing parameters for the sync service.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between divergence checks.
    /// Default: 3s
    pub divergence_check_interval: Duration,

    /// A node whose last sync is older than this is reported diverged.
    /// Default: 5s
    pub divergence_threshold: Duration,

    /// Interval between cluster-wide sync rounds.
    /// Default: 10s
    pub sync_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            divergence_check_interval: Duration::from_secs(3),
            divergence_threshold: Duration::from_secs(5),
            sync_interval: Duration::from_secs(10),
        }
    }
}

impl SyncConfig {
    /// Set the divergence check interval.
    pub fn with_divergence_check_interval(mut self, interval: Duration) -> Self {
        self.divergence_check_interval = interval;
        self
    }

    /// Set the divergence threshold.
    pub fn with_divergence_threshold(mut self, threshold: Duration) -> Self {
        self.divergence_threshold = threshold;
        self
    }

    /// Set the cluster sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }
}

/// Per-node sync bookkeeping.
struct SyncEntry {
    /// Shared clock reference — the same instance other components mutate
    clock: Arc<VectorClock>,

    /// When this node last took part in a sync round
    last_sync: Instant,
}

/// Full-mesh clock reconciliation service.
///
/// Divergence is keyed on *sync* staleness, not clock activity: the
/// threshold only resets when a node participates in a sync round, so a
/// registered node that never syncs is reported diverged regardless of
/// how current its counters are. That coupling is the intended trigger.
pub struct ClockSyncService {
    /// Timing parameters
    config: SyncConfig,

    /// Registered nodes (node id → entry)
    entries: RwLock<HashMap<String, SyncEntry>>,

    /// Shutdown notifier shared by both loops
    shutdown: Arc<Notify>,
}

impl ClockSyncService {
    /// Create a sync service with the given timing parameters.
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Register a node's clock for synchronization.
    ///
    /// The first registration for an id wins; re-registering an existing
    /// id keeps the original clock reference. Registration stamps the
    /// node's last-sync time.
    pub fn register(&self, node_id: &str, clock: Arc<VectorClock>) {
        let mut entries = self.entries.write();
        entries.entry(node_id.to_string()).or_insert_with(|| {
            tracing::info!(node = node_id, "node registered for synchronization");
            SyncEntry {
                clock,
                last_sync: Instant::now(),
            }
        });
    }

    /// Get the ids of registered nodes.
    pub fn registered_nodes(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Flag nodes whose last sync is older than the threshold.
    ///
    /// Returns the diverged node ids.
    pub fn check_divergence(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.read();

        let mut diverged = Vec::new();
        for (node_id, entry) in entries.iter() {
            let since_sync = now.duration_since(entry.last_sync);
            if since_sync > self.config.divergence_threshold {
                tracing::warn!(
                    node = %node_id,
                    seconds_since_sync = since_sync.as_secs_f64(),
                    "node diverged from cluster"
                );
                diverged.push(node_id.clone());
            }
        }

        if diverged.is_empty() {
            tracing::debug!("all nodes synchronized");
        }
        diverged
    }

    /// Run one cluster-wide sync round.
    ///
    /// Computes the pointwise maximum per node-id key across all
    /// registered snapshots, merges that into every registered clock, and
    /// stamps every node's last-sync time. Skipped when fewer than two
    /// clocks are registered.
    pub fn perform_cluster_sync(&self) {
        let mut entries = self.entries.write();
        if entries.len() < 2 {
            return;
        }

        let mut merged: ClockSnapshot = HashMap::new();
        for entry in entries.values() {
            for (node, count) in entry.clock.snapshot() {
                let slot = merged.entry(node).or_insert(0);
                if count > *slot {
                    *slot = count;
                }
            }
        }

        let now = Instant::now();
        for entry in entries.values_mut() {
            entry.clock.merge(&merged);
            entry.last_sync = now;
        }

        tracing::info!(nodes = entries.len(), "cluster clocks synchronized");
    }

    /// Request shutdown of both loops.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Start the divergence-check and cluster-sync loops.
    ///
    /// Spawns two background tasks and returns immediately. Call
    /// [`shutdown`] to stop both.
    ///
    /// [`shutdown`]: ClockSyncService::shutdown
    pub fn start(self: Arc<Self>) {
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sleep(service.config.divergence_check_interval) => {
                        service.check_divergence();
                    }
                    _ = service.shutdown.notified() => break,
                }
            }
        });

        let service = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sleep(service.config.sync_interval) => {
                        service.perform_cluster_sync();
                    }
                    _ = service.shutdown.notified() => break,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(pairs: &[(&str, u64)]) -> ClockSnapshot {
        pairs.iter().map(|(id, c)| (id.to_string(), *c)).collect()
    }

    #[tokio::test]
    async fn test_cluster_sync_merges_to_pointwise_max() {
        let service = ClockSyncService::new(SyncConfig::default());

        let a = Arc::new(VectorClock::new("A"));
        let b = Arc::new(VectorClock::new("B"));
        for _ in 0..3 {
            a.increment();
        }
        for _ in 0..5 {
            b.increment();
        }

        service.register("A", a.clone());
        service.register("B", b.clone());
        service.perform_cluster_sync();

        let expected = snap(&[("A", 3), ("B", 5)]);
        assert_eq!(a.snapshot(), expected);
        assert_eq!(b.snapshot(), expected);
    }

    #[tokio::test]
    async fn test_sync_with_single_clock_is_skipped() {
        let service = ClockSyncService::new(SyncConfig::default());

        let a = Arc::new(VectorClock::new("A"));
        a.increment();
        service.register("A", a.clone());
        service.perform_cluster_sync();

        assert_eq!(a.snapshot(), snap(&[("A", 1)]));
    }

    #[tokio::test]
    async fn test_sync_resets_divergence() {
        let config = SyncConfig::default().with_divergence_threshold(Duration::from_millis(40));
        let service = ClockSyncService::new(config);

        service.register("A", Arc::new(VectorClock::new("A")));
        service.register("B", Arc::new(VectorClock::new("B")));

        sleep(Duration::from_millis(80)).await;
        let mut diverged = service.check_divergence();
        diverged.sort();
        assert_eq!(diverged, vec!["A".to_string(), "B".to_string()]);

        service.perform_cluster_sync();
        assert!(service.check_divergence().is_empty());
    }

    #[tokio::test]
    async fn test_node_that_never_syncs_stays_diverged() {
        // Divergence tracks sync participation, not clock activity: local
        // increments do not reset the threshold.
        let config = SyncConfig::default().with_divergence_threshold(Duration::from_millis(40));
        let service = ClockSyncService::new(config);

        let a = Arc::new(VectorClock::new("A"));
        service.register("A", a.clone());

        sleep(Duration::from_millis(80)).await;
        a.increment();
        assert_eq!(service.check_divergence(), vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn test_reregistration_keeps_original_clock() {
        let service = ClockSyncService::new(SyncConfig::default());

        let first = Arc::new(VectorClock::new("A"));
        let second = Arc::new(VectorClock::new("A"));
        service.register("A", first.clone());
        service.register("A", second);
        service.register("B", Arc::new(VectorClock::new("B")));

        first.increment();
        service.perform_cluster_sync();

        // The sync round read the first clock, not the replacement.
        assert_eq!(service.registered_nodes().len(), 2);
        assert_eq!(first.snapshot().get("A"), Some(&1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_background_loops_sync_and_stop() {
        let config = SyncConfig::default()
            .with_sync_interval(Duration::from_millis(20))
            .with_divergence_check_interval(Duration::from_millis(20));
        let service = Arc::new(ClockSyncService::new(config));

        let a = Arc::new(VectorClock::new("A"));
        let b = Arc::new(VectorClock::new("B"));
        a.increment();
        service.register("A", a.clone());
        service.register("B", b.clone());

        service.clone().start();
        sleep(Duration::from_millis(100)).await;
        service.shutdown();

        assert_eq!(b.snapshot().get("A"), Some(&1));
    }
}
