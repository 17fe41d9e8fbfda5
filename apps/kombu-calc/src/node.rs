//! Node wiring.
//!
//! Builds one simulated cluster node out of the coordination primitives:
//! a shared vector clock, the gossip registry and loop, the centralized
//! clock sync service, the partition registry (optionally fed by the
//! random injector), file-based leader election, the arithmetic service,
//! and a two-phase commit coordinator over the whole cluster.

use crate::config::{ConfigError, NodeConfig};
use crate::service::ArithmeticService;
use kombu_clock::VectorClock;
use kombu_cluster::{
    ClockSyncService, ElectionError, LeaderElection, PartitionInjector,
    PartitionInjectorConfig, PartitionRegistry, SyncConfig,
};
use kombu_commit::{Coordinator, SimulatedTransport, SimulatedTransportConfig};
use kombu_gossip::{GossipConfig, GossipProtocol, NodeRegistry};
use std::sync::Arc;
use thiserror::Error;

/// Node startup/shutdown errors.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Election error: {source}")]
    Election {
        #[from]
        source: ElectionError,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// A running kombu-calc node.
pub struct Node {
    config: NodeConfig,
    clock: Arc<VectorClock>,
    partitions: Arc<PartitionRegistry>,
    registry: Arc<NodeRegistry>,
    gossip: Arc<GossipProtocol>,
    sync: Arc<ClockSyncService>,
    injector: Option<Arc<PartitionInjector>>,
    election: Arc<LeaderElection>,
    service: Arc<ArithmeticService>,
    coordinator: Arc<Coordinator>,
}

impl Node {
    /// Build a node from its configuration.
    ///
    /// Peers get their own in-process clocks — the whole cluster is
    /// simulated inside one process, which is the point of the toolkit.
    pub async fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let clock = Arc::new(VectorClock::new(&config.node_id));
        let partitions = Arc::new(PartitionRegistry::new());

        // Gossip and sync see every cluster member; peers carry fresh
        // clocks that only gossip/sync will advance.
        let registry = Arc::new(NodeRegistry::new());
        let sync = Arc::new(ClockSyncService::new(SyncConfig::default()));

        registry.register(&config.node_id, &config.address, clock.clone());
        sync.register(&config.node_id, clock.clone());
        for peer in &config.peers {
            let peer_clock = Arc::new(VectorClock::new(&peer.node_id));
            registry.register(&peer.node_id, &peer.address, peer_clock.clone());
            sync.register(&peer.node_id, peer_clock);
        }

        let gossip = Arc::new(GossipProtocol::new(
            config.node_id.clone(),
            registry.clone(),
            GossipConfig::default(),
        ));

        let injector = if config.simulation.inject_partitions {
            let mut nodes: Vec<String> = vec![config.node_id.clone()];
            nodes.extend(config.peers.iter().map(|p| p.node_id.clone()));
            Some(Arc::new(PartitionInjector::new(
                partitions.clone(),
                nodes,
                PartitionInjectorConfig::default(),
            )))
        } else {
            None
        };

        let election = Arc::new(LeaderElection::new(config.leader_file()));

        let service = Arc::new(ArithmeticService::new(
            config.node_id.clone(),
            clock.clone(),
            partitions.clone(),
            config.simulation.clone(),
        ));

        let mut participants = vec![config.node_id.clone()];
        participants.extend(config.peers.iter().map(|p| p.node_id.clone()));
        let transport = Arc::new(SimulatedTransport::new(SimulatedTransportConfig::default()));
        let coordinator =
            Arc::new(Coordinator::new(participants, transport).with_clock(clock.clone()));

        Ok(Self {
            config,
            clock,
            partitions,
            registry,
            gossip,
            sync,
            injector,
            election,
            service,
            coordinator,
        })
    }

    /// Start background loops and run the startup election.
    ///
    /// Elects this node only when there is no active leader on record.
    pub async fn start(&self) -> Result<(), NodeError> {
        let current = self.election.current_leader().await;
        if current.map(|leader| leader.is_active) != Some(true) {
            self.election
                .elect(&self.config.node_id, &self.config.address)
                .await?;
        }

        self.gossip.clone().start();
        self.sync.clone().start();
        if let Some(injector) = &self.injector {
            injector.clone().start();
        }

        tracing::info!(node = %self.config.node_id, "node started");
        Ok(())
    }

    /// Stop every background loop.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        self.gossip.shutdown();
        self.sync.shutdown();
        if let Some(injector) = &self.injector {
            injector.shutdown();
        }

        tracing::info!(node = %self.config.node_id, "node stopped");
        Ok(())
    }

    /// This node's id.
    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    /// This node's clock.
    pub fn clock(&self) -> &Arc<VectorClock> {
        &self.clock
    }

    /// The shared partition registry.
    pub fn partitions(&self) -> &Arc<PartitionRegistry> {
        &self.partitions
    }

    /// The gossip node registry.
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// The gossip protocol instance.
    pub fn gossip(&self) -> &Arc<GossipProtocol> {
        &self.gossip
    }

    /// The leader election handle.
    pub fn election(&self) -> &Arc<LeaderElection> {
        &self.election
    }

    /// The arithmetic request handler.
    pub fn service(&self) -> &Arc<ArithmeticService> {
        &self.service
    }

    /// The cluster-wide 2PC coordinator.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }
}
