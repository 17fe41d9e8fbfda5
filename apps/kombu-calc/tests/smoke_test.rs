//! Smoke tests for kombu-calc.
//!
//! Verifies that a node can start up, elect itself, serve clocked
//! requests, run a distributed transaction, and shut down cleanly.

use kombu_calc::config::{NodeConfig, PeerConfig, SimulationConfig};
use kombu_calc::node::Node;
use kombu_calc::service::{CalcRequest, ServiceError};
use kombu_clock::ClockSnapshot;
use kombu_commit::{CommitError, Operation};
use tempfile::TempDir;
use tokio::time::Duration;

fn test_config(data_dir: &TempDir) -> NodeConfig {
    NodeConfig {
        node_id: "S1".to_string(),
        address: "http://localhost:5001".to_string(),
        data_dir: data_dir.path().to_path_buf(),
        peers: vec![
            PeerConfig {
                node_id: "S2".to_string(),
                address: "http://localhost:5002".to_string(),
            },
            PeerConfig {
                node_id: "S3".to_string(),
                address: "http://localhost:5003".to_string(),
            },
        ],
        simulation: SimulationConfig {
            min_processing_delay_ms: 0,
            max_processing_delay_ms: 1,
            failure_rate: 0.0,
            inject_partitions: false,
        },
    }
}

fn square_request(operand: f64) -> CalcRequest {
    let mut clock = ClockSnapshot::default();
    clock.insert("client".to_string(), 1);
    CalcRequest {
        op: Operation::Square,
        operand1: operand,
        operand2: 0.0,
        clock,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_single_node_lifecycle() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init()
        .ok();

    let dir = TempDir::new().unwrap();
    let node = Node::new(test_config(&dir)).await.expect("Failed to create node");
    node.start().await.expect("Failed to start node");

    // Startup election: no prior leader, so this node elects itself.
    assert!(node.election().is_leader("S1").await);

    // A clocked request flows through merge + increment and succeeds.
    let response = node.service().handle(square_request(5.0)).await.unwrap();
    assert!(response.success);
    assert_eq!(response.result, Some(25.0));
    assert_eq!(response.clock.get("client"), Some(&1));
    assert_eq!(response.clock.get("S1"), Some(&1));

    node.shutdown().await.expect("Failed to shut down node");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_startup_respects_existing_active_leader() {
    let dir = TempDir::new().unwrap();
    let node = Node::new(test_config(&dir)).await.unwrap();

    // Another node already holds an active leadership record.
    node.election()
        .elect("S9", "http://localhost:5009")
        .await
        .unwrap();

    node.start().await.unwrap();

    assert!(node.election().is_leader("S9").await);
    assert!(!node.election().is_leader("S1").await);

    node.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_startup_replaces_downed_leader() {
    let dir = TempDir::new().unwrap();
    let node = Node::new(test_config(&dir)).await.unwrap();

    node.election()
        .elect("S9", "http://localhost:5009")
        .await
        .unwrap();
    node.election().mark_down("S9").await.unwrap();

    node.start().await.unwrap();

    assert!(node.election().is_leader("S1").await);

    node.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_partitioned_node_rejects_requests() {
    let dir = TempDir::new().unwrap();
    let node = Node::new(test_config(&dir)).await.unwrap();
    node.start().await.unwrap();

    node.partitions().partition("S1");
    let err = node.service().handle(square_request(5.0)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable { .. }));

    node.partitions().heal("S1");
    assert!(node.service().handle(square_request(5.0)).await.is_ok());

    node.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_distributed_transaction_commits_or_aborts_cleanly() {
    let dir = TempDir::new().unwrap();
    let node = Node::new(test_config(&dir)).await.unwrap();
    node.start().await.unwrap();

    // The node's coordinator runs over the default fault-injecting
    // transport, so either outcome is legitimate — what matters is that
    // a commit carries the right value and an abort is reported as such.
    match node.coordinator().execute(Operation::Square, 5.0, 0.0).await {
        Ok(result) => assert_eq!(result, 25.0),
        Err(CommitError::Aborted { .. }) => {}
        Err(other) => panic!("unexpected 2PC outcome: {other}"),
    }

    node.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_gossip_spreads_local_events_to_peer_clocks() {
    let dir = TempDir::new().unwrap();
    let node = Node::new(test_config(&dir)).await.unwrap();

    // Three local events, then one manual gossip tick.
    for _ in 0..3 {
        node.clock().increment();
    }
    let peer = node.gossip().gossip_once().await.expect("a peer to gossip with");

    let peer_clock = node.registry().node(&peer).unwrap().clock.snapshot();
    assert_eq!(peer_clock.get("S1"), Some(&3));

    // Wait long enough for at least a moment of background life, then
    // stop; shutdown must leave no loop running.
    node.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    node.shutdown().await.unwrap();
}
