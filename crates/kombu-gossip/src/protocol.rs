//! The gossip exchange loop.

use crate::config::GossipConfig;
use crate::convergence::{converged, ConvergenceOutcome};
use crate::registry::{GossipNode, NodeRegistry};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tokio::time::sleep;

/// One node's view of the epidemic protocol.
///
/// Several protocol instances (one per simulated node) typically share a
/// single [`NodeRegistry`]; each runs its own independent periodic loop.
/// On every tick the node picks one other active peer uniformly at random
/// and both sides merge the other's pre-exchange snapshot — a symmetric
/// one-round push-pull.
pub struct GossipProtocol {
    /// This node's id
    local_id: String,

    /// Shared node registry
    registry: Arc<NodeRegistry>,

    /// Protocol configuration
    config: GossipConfig,

    /// Shutdown notifier
    shutdown: Arc<Notify>,
}

impl GossipProtocol {
    /// Create a gossip protocol instance for `local_id`.
    pub fn new(local_id: impl Into<String>, registry: Arc<NodeRegistry>, config: GossipConfig) -> Self {
        let local_id = local_id.into();
        tracing::info!(node = %local_id, "gossip protocol started");
        Self {
            local_id,
            registry,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get this node's id.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Get the shared registry.
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Request shutdown of the gossip loop.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Get the shutdown notifier for external use.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Start the periodic gossip loop. Spawns a task and returns.
    pub fn start(self: Arc<Self>) {
        let protocol = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sleep(protocol.config.gossip_interval) => {
                        protocol.gossip_once().await;
                    }
                    _ = protocol.shutdown.notified() => break,
                }
            }
        });
    }

    /// Run a single gossip tick.
    ///
    /// Returns the peer exchanged with, or `None` when no other active
    /// peer was available (the tick is skipped, not an error).
    pub async fn gossip_once(&self) -> Option<String> {
        let peer = self.pick_peer()?;
        let Some(local) = self.registry.node(&self.local_id) else {
            tracing::warn!(node = %self.local_id, "local node not registered, skipping gossip");
            return None;
        };

        tracing::debug!(node = %self.local_id, peer = %peer.node_id, "gossiping");

        // Simulated exchange round trip.
        sleep(self.config.exchange_delay).await;

        // Symmetric push-pull: each side merges the other's snapshot as it
        // was before the exchange.
        let local_snapshot = local.clock.snapshot();
        let peer_snapshot = peer.clock.snapshot();
        local.clock.merge(&peer_snapshot);
        peer.clock.merge(&local_snapshot);

        self.registry.touch(&self.local_id);
        self.registry.touch(&peer.node_id);

        self.log_convergence();
        Some(peer.node_id)
    }

    /// Pick a random active peer other than this node.
    fn pick_peer(&self) -> Option<GossipNode> {
        let candidates: Vec<GossipNode> = self
            .registry
            .active_nodes()
            .into_iter()
            .filter(|n| n.node_id != self.local_id)
            .collect();

        if candidates.is_empty() {
            tracing::debug!(node = %self.local_id, "no other active nodes for gossip");
            return None;
        }

        let mut rng = rand::thread_rng();
        candidates.choose(&mut rng).cloned()
    }

    /// Check convergence across all active nodes at the given tolerance.
    pub fn converged_now(&self, tolerance: u64) -> bool {
        let snapshots: Vec<_> = self
            .registry
            .active_nodes()
            .iter()
            .map(|n| n.clock.snapshot())
            .collect();
        converged(&snapshots, tolerance)
    }

    fn log_convergence(&self) {
        if self.converged_now(self.config.check_tolerance) {
            tracing::info!(node = %self.local_id, "gossip network converged");
        } else {
            tracing::debug!(node = %self.local_id, "gossip network still converging");
        }

        for node in self.registry.active_nodes() {
            tracing::debug!(
                node = %node.node_id,
                clock = %node.clock,
                last_seen_secs = node.last_seen.elapsed().as_secs_f64(),
                "gossip network state"
            );
        }
    }

    /// Poll until the network converges, or the configured timeout lapses.
    ///
    /// Uses the tighter measurement tolerance. The timeout is reported as
    /// a distinguishable [`ConvergenceOutcome::TimedOut`], not an error.
    pub async fn measure_convergence_time(&self) -> ConvergenceOutcome {
        let start = Instant::now();
        tracing::info!(node = %self.local_id, "starting convergence measurement");

        loop {
            sleep(self.config.measure_poll_interval).await;

            if self.converged_now(self.config.measure_tolerance) {
                let elapsed = start.elapsed();
                tracing::info!(
                    node = %self.local_id,
                    seconds = elapsed.as_secs_f64(),
                    "convergence achieved"
                );
                return ConvergenceOutcome::Converged(elapsed);
            }

            if start.elapsed() > self.config.measure_timeout {
                tracing::warn!(node = %self.local_id, "convergence measurement timed out");
                return ConvergenceOutcome::TimedOut(self.config.measure_timeout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kombu_clock::VectorClock;
    use std::time::Duration;

    fn quick_config() -> GossipConfig {
        GossipConfig::default()
            .with_gossip_interval(Duration::from_millis(10))
            .with_exchange_delay(Duration::from_millis(1))
            .with_measurement(Duration::from_millis(10), Duration::from_millis(500))
    }

    fn register(registry: &NodeRegistry, id: &str, events: u64) -> Arc<VectorClock> {
        let clock = Arc::new(VectorClock::new(id));
        for _ in 0..events {
            clock.increment();
        }
        registry.register(id, &format!("mem://{id}"), clock.clone());
        clock
    }

    #[tokio::test]
    async fn test_gossip_once_merges_both_sides() {
        let registry = Arc::new(NodeRegistry::new());
        let a = register(&registry, "A", 3);
        let b = register(&registry, "B", 5);

        let protocol = GossipProtocol::new("A", registry, quick_config());
        let peer = protocol.gossip_once().await;

        assert_eq!(peer.as_deref(), Some("B"));
        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(a.snapshot().get("A"), Some(&3));
        assert_eq!(a.snapshot().get("B"), Some(&5));
    }

    #[tokio::test]
    async fn test_gossip_skips_tick_without_peers() {
        let registry = Arc::new(NodeRegistry::new());
        register(&registry, "A", 1);

        let protocol = GossipProtocol::new("A", registry, quick_config());
        assert!(protocol.gossip_once().await.is_none());
    }

    #[tokio::test]
    async fn test_inactive_peer_not_selected() {
        let registry = Arc::new(NodeRegistry::new());
        register(&registry, "A", 1);
        register(&registry, "B", 1);
        registry.mark_inactive("B");

        let protocol = GossipProtocol::new("A", registry, quick_config());
        assert!(protocol.gossip_once().await.is_none());
    }

    #[tokio::test]
    async fn test_exchange_updates_last_seen() {
        let registry = Arc::new(NodeRegistry::new());
        register(&registry, "A", 0);
        register(&registry, "B", 0);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let stale = registry.node("B").unwrap().last_seen;

        let protocol = GossipProtocol::new("A", registry.clone(), quick_config());
        protocol.gossip_once().await;

        assert!(registry.node("B").unwrap().last_seen > stale);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_repeated_exchanges_converge_three_nodes() {
        let registry = Arc::new(NodeRegistry::new());
        register(&registry, "A", 4);
        register(&registry, "B", 9);
        register(&registry, "C", 2);

        let protocols: Vec<Arc<GossipProtocol>> = ["A", "B", "C"]
            .iter()
            .map(|id| Arc::new(GossipProtocol::new(*id, registry.clone(), quick_config())))
            .collect();
        for protocol in &protocols {
            protocol.clone().start();
        }

        let outcome = protocols[0].measure_convergence_time().await;
        for protocol in &protocols {
            protocol.shutdown();
        }

        assert!(outcome.is_converged(), "expected convergence, got {outcome:?}");
        // Exact agreement after enough symmetric merges.
        let a = registry.node("A").unwrap().clock.snapshot();
        assert_eq!(a.get("B"), Some(&9));
        assert_eq!(a.get("C"), Some(&2));
    }

    #[tokio::test]
    async fn test_measurement_timeout_is_distinguishable() {
        // A lone node never converges; the measurement must report the
        // bounded timeout rather than an error or a fake success.
        let registry = Arc::new(NodeRegistry::new());
        register(&registry, "A", 1);

        let config = quick_config().with_measurement(
            Duration::from_millis(10),
            Duration::from_millis(50),
        );
        let protocol = GossipProtocol::new("A", registry, config);

        let outcome = protocol.measure_convergence_time().await;
        assert_eq!(
            outcome,
            ConvergenceOutcome::TimedOut(Duration::from_millis(50))
        );
        assert!(!outcome.is_converged());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_loop_start_and_shutdown() {
        let registry = Arc::new(NodeRegistry::new());
        let a = register(&registry, "A", 2);
        register(&registry, "B", 0);

        let protocol = Arc::new(GossipProtocol::new("A", registry.clone(), quick_config()));
        protocol.clone().start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        protocol.shutdown();

        // At least one exchange happened while the loop ran.
        let b = registry.node("B").unwrap().clock.snapshot();
        assert_eq!(b.get("A"), a.snapshot().get("A"));
    }
}
