//! The clocked arithmetic service.
//!
//! Every request follows the same contract: the caller increments its own
//! clock and attaches a snapshot before sending; the service saves its
//! clock state, merges the incoming snapshot, increments, and does the
//! (artificially slow) work. A simulated failure rolls the clock back and
//! returns a failed response; a partitioned node rejects the call outright
//! with a distinguishable unavailable error. Responses always carry the
//! service's current snapshot — callers merge it in whether or not the
//! call succeeded.

use crate::config::SimulationConfig;
use kombu_clock::{ClockSnapshot, VectorClock};
use kombu_cluster::PartitionRegistry;
use kombu_commit::Operation;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// A clocked arithmetic request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalcRequest {
    /// Requested operation
    pub op: Operation,

    /// First operand
    pub operand1: f64,

    /// Second operand (multiply only)
    pub operand2: f64,

    /// Caller clock snapshot, incremented before sending
    #[serde(default)]
    pub clock: ClockSnapshot,
}

/// A clocked arithmetic response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalcResponse {
    /// Whether the operation produced a result
    pub success: bool,

    /// The computed value, present on success
    pub result: Option<f64>,

    /// Failure detail, present on failure
    pub error: Option<String>,

    /// Service clock snapshot at reply time
    pub clock: ClockSnapshot,
}

/// Service-level errors.
///
/// Only partition rejection surfaces here; simulated operation failures
/// are ordinary failed responses, not errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The node is partitioned and cannot serve requests.
    #[error("Node {node_id} is partitioned")]
    Unavailable { node_id: String },
}

/// Arithmetic request handler bound to one node's clock and the shared
/// partition registry.
pub struct ArithmeticService {
    /// This node's id
    node_id: String,

    /// This node's clock (shared with gossip and sync)
    clock: Arc<VectorClock>,

    /// Shared partition registry
    partitions: Arc<PartitionRegistry>,

    /// Delay and failure knobs
    simulation: SimulationConfig,
}

impl ArithmeticService {
    /// Create a service for `node_id`.
    pub fn new(
        node_id: impl Into<String>,
        clock: Arc<VectorClock>,
        partitions: Arc<PartitionRegistry>,
        simulation: SimulationConfig,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            clock,
            partitions,
            simulation,
        }
    }

    /// Get this node's id.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Handle one clocked request.
    ///
    /// Returns `Err(Unavailable)` when the node is partitioned — before
    /// any clock movement. Otherwise the clock is tentatively advanced
    /// (merge + increment), the delay elapses, and either the result or a
    /// rolled-back failure response comes back.
    pub async fn handle(&self, request: CalcRequest) -> Result<CalcResponse, ServiceError> {
        if self.partitions.is_partitioned(&self.node_id) {
            tracing::warn!(node = %self.node_id, "request rejected: node partitioned");
            return Err(ServiceError::Unavailable {
                node_id: self.node_id.clone(),
            });
        }

        tracing::info!(node = %self.node_id, op = %request.op, "operation requested");

        // Tentatively clock the operation; a failure below undoes this.
        self.clock.save_state();
        self.clock.merge(&request.clock);
        self.clock.increment();

        let delay = self.processing_delay();
        tracing::debug!(node = %self.node_id, delay_ms = delay.as_millis() as u64, "processing");
        sleep(delay).await;

        if self.should_fail(&request) {
            self.clock.rollback();
            return Ok(CalcResponse {
                success: false,
                result: None,
                error: Some("simulated server error".to_string()),
                clock: self.clock.snapshot(),
            });
        }

        let result = request.op.apply(request.operand1, request.operand2);
        tracing::info!(node = %self.node_id, op = %request.op, result, "operation complete");

        Ok(CalcResponse {
            success: true,
            result: Some(result),
            error: None,
            clock: self.clock.snapshot(),
        })
    }

    fn processing_delay(&self) -> Duration {
        let (min, max) = self.simulation.delay_bounds();
        if max <= min {
            return min;
        }
        let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
        Duration::from_millis(millis as u64)
    }

    /// Negative operands always fail; otherwise fail at the configured
    /// spurious rate.
    fn should_fail(&self, request: &CalcRequest) -> bool {
        if request.operand1 < 0.0 || request.operand2 < 0.0 {
            tracing::warn!(node = %self.node_id, "negative operand not supported");
            return true;
        }
        if self.simulation.failure_rate <= 0.0 {
            return false;
        }
        rand::thread_rng().gen::<f64>() < self.simulation.failure_rate
    }
}
