//! Network partition simulation.
//!
//! [`PartitionRegistry`] is a membership set of node ids currently
//! considered unreachable. Request handlers consult it synchronously
//! before doing any work. [`PartitionInjector`] is the fault-injection
//! driver: a background loop that periodically isolates a random node for
//! a random duration, then heals it.

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

/// Shared set of unreachable node ids.
///
/// Constructed per context (test or process) and passed to components
/// explicitly — there is no process-wide registry.
#[derive(Default)]
pub struct PartitionRegistry {
    /// Node ids currently isolated
    partitioned: RwLock<HashSet<String>>,
}

impl PartitionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a node as unreachable.
    pub fn partition(&self, node_id: &str) {
        self.partitioned.write().insert(node_id.to_string());
        tracing::warn!(node = node_id, "network partition: node isolated");
    }

    /// Mark a node as reachable again.
    pub fn heal(&self, node_id: &str) {
        self.partitioned.write().remove(node_id);
        tracing::info!(node = node_id, "partition healed: node back online");
    }

    /// Check whether a node is currently unreachable.
    pub fn is_partitioned(&self, node_id: &str) -> bool {
        self.partitioned.read().contains(node_id)
    }

    /// Get all currently partitioned node ids.
    pub fn partitioned_nodes(&self) -> Vec<String> {
        self.partitioned.read().iter().cloned().collect()
    }
}

/// Timing bounds for the random fault-injection loop.
#[derive(Debug, Clone)]
pub struct PartitionInjectorConfig {
    /// Minimum pause between injected partitions.
    /// Default: 10s
    pub min_pause: Duration,

    /// Maximum pause between injected partitions.
    /// Default: 30s
    pub max_pause: Duration,

    /// Minimum duration an injected partition lasts.
    /// Default: 5s
    pub min_outage: Duration,

    /// Maximum duration an injected partition lasts.
    /// Default: 15s
    pub max_outage: Duration,
}

impl Default for PartitionInjectorConfig {
    fn default() -> Self {
        Self {
            min_pause: Duration::from_secs(10),
            max_pause: Duration::from_secs(30),
            min_outage: Duration::from_secs(5),
            max_outage: Duration::from_secs(15),
        }
    }
}

impl PartitionInjectorConfig {
    /// Set the pause bounds between injected partitions.
    pub fn with_pause(mut self, min: Duration, max: Duration) -> Self {
        self.min_pause = min;
        self.max_pause = max;
        self
    }

    /// Set the outage duration bounds.
    pub fn with_outage(mut self, min: Duration, max: Duration) -> Self {
        self.min_outage = min;
        self.max_outage = max;
        self
    }
}

/// Background loop that randomly partitions and heals nodes.
///
/// A driver for fault injection, not a decision engine: it only toggles
/// registry membership. Start with [`start`], stop with [`shutdown`]; the
/// loop never leaves a partition behind on shutdown.
///
/// [`start`]: PartitionInjector::start
/// [`shutdown`]: PartitionInjector::shutdown
pub struct PartitionInjector {
    /// Registry the injector toggles
    registry: Arc<PartitionRegistry>,

    /// Candidate node ids
    nodes: Vec<String>,

    /// Timing bounds
    config: PartitionInjectorConfig,

    /// Shutdown notifier
    shutdown: Arc<Notify>,
}

impl PartitionInjector {
    /// Create an injector over the given candidate nodes.
    pub fn new(
        registry: Arc<PartitionRegistry>,
        nodes: Vec<String>,
        config: PartitionInjectorConfig,
    ) -> Self {
        Self {
            registry,
            nodes,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Get the shutdown notifier for external use.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Start the injection loop. Spawns a background task and returns.
    pub fn start(self: Arc<Self>) {
        let injector = self.clone();
        tokio::spawn(async move {
            injector.run().await;
        });
    }

    async fn run(&self) {
        if self.nodes.is_empty() {
            tracing::warn!("partition injector started with no candidate nodes");
            return;
        }

        loop {
            let pause = random_duration(self.config.min_pause, self.config.max_pause);
            tokio::select! {
                _ = sleep(pause) => {}
                _ = self.shutdown.notified() => break,
            }

            if !self.inject_once().await {
                break;
            }
        }
    }

    /// Partition one random node, hold the outage, then heal it.
    ///
    /// Returns false when shutdown was requested mid-outage. The node is
    /// healed before returning in either case.
    pub async fn inject_once(&self) -> bool {
        let target = {
            let mut rng = rand::thread_rng();
            self.nodes.choose(&mut rng).cloned()
        };
        let Some(target) = target else {
            return true;
        };

        if self.registry.is_partitioned(&target) {
            return true;
        }

        self.registry.partition(&target);
        let outage = random_duration(self.config.min_outage, self.config.max_outage);

        let keep_running = tokio::select! {
            _ = sleep(outage) => true,
            _ = self.shutdown.notified() => false,
        };

        self.registry.heal(&target);
        keep_running
    }
}

fn random_duration(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let mut rng = rand::thread_rng();
    let millis = rng.gen_range(min.as_millis()..=max.as_millis());
    Duration::from_millis(millis as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn test_partition_toggle() {
        let registry = PartitionRegistry::new();

        registry.partition("S1");
        assert!(registry.is_partitioned("S1"));

        registry.heal("S1");
        assert!(!registry.is_partitioned("S1"));
    }

    #[test]
    fn test_unknown_node_is_not_partitioned() {
        let registry = PartitionRegistry::new();
        assert!(!registry.is_partitioned("S9"));

        // Healing a node that was never partitioned is a no-op.
        registry.heal("S9");
        assert!(!registry.is_partitioned("S9"));
    }

    #[test]
    fn test_partitioned_nodes_listing() {
        let registry = PartitionRegistry::new();
        registry.partition("S1");
        registry.partition("S2");

        let mut nodes = registry.partitioned_nodes();
        nodes.sort();
        assert_eq!(nodes, vec!["S1".to_string(), "S2".to_string()]);
    }

    #[tokio::test]
    async fn test_inject_once_partitions_then_heals() {
        let registry = Arc::new(PartitionRegistry::new());
        let config = PartitionInjectorConfig::default()
            .with_pause(Duration::from_millis(1), Duration::from_millis(2))
            .with_outage(Duration::from_millis(20), Duration::from_millis(20));
        let injector =
            PartitionInjector::new(registry.clone(), vec!["S1".to_string()], config);

        let ran = tokio::spawn(async move { injector.inject_once().await });

        // The single candidate must be partitioned during the outage
        // window, and healed once the cycle completes.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.is_partitioned("S1"));

        assert!(ran.await.unwrap());
        assert!(!registry.is_partitioned("S1"));
    }

    #[tokio::test]
    async fn test_injector_shutdown_heals_in_flight_partition() {
        let registry = Arc::new(PartitionRegistry::new());
        let config = PartitionInjectorConfig::default()
            .with_pause(Duration::from_millis(1), Duration::from_millis(2))
            .with_outage(Duration::from_secs(60), Duration::from_secs(60));
        let injector = Arc::new(PartitionInjector::new(
            registry.clone(),
            vec!["S1".to_string()],
            config,
        ));

        injector.clone().start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(registry.is_partitioned("S1"));

        injector.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!registry.is_partitioned("S1"));
    }

    #[tokio::test]
    async fn test_injector_with_no_nodes_exits() {
        let registry = Arc::new(PartitionRegistry::new());
        let injector = Arc::new(PartitionInjector::new(
            registry,
            vec![],
            PartitionInjectorConfig::default(),
        ));

        // run() returns immediately rather than spinning.
        let result = timeout(Duration::from_millis(100), injector.run()).await;
        assert!(result.is_ok());
    }
}
