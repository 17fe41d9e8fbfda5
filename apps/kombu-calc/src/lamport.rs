//! Lamport-stamped arithmetic service.
//!
//! The scalar-clock counterpart of [`crate::service::ArithmeticService`]:
//! same operations and failure simulation, but requests carry a single
//! Lamport timestamp instead of a vector snapshot, and the receive rule
//! is `max(local, received) + 1`. There is no rollback — a scalar clock
//! has no tentative state to undo, which is part of what the comparison
//! between the two disciplines is meant to teach.

use crate::config::SimulationConfig;
use crate::service::{CalcRequest, CalcResponse};
use kombu_clock::{ClockSnapshot, LamportClock};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Arithmetic handler stamping responses with a Lamport clock.
pub struct LamportArithmeticService {
    /// This node's id
    node_id: String,

    /// This node's scalar clock
    clock: Arc<LamportClock>,

    /// Delay and failure knobs
    simulation: SimulationConfig,
}

impl LamportArithmeticService {
    /// Create a service for `node_id`.
    pub fn new(
        node_id: impl Into<String>,
        clock: Arc<LamportClock>,
        simulation: SimulationConfig,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            clock,
            simulation,
        }
    }

    /// Get this node's id.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Handle one request stamped with a Lamport time.
    ///
    /// The received time is the largest value in the request's clock map
    /// (a Lamport caller sends a single entry). The response clock is one
    /// entry: this node's id mapped to its post-receive time.
    pub async fn handle(&self, request: CalcRequest) -> CalcResponse {
        let received = request.clock.values().copied().max().unwrap_or(0);
        let time = self.clock.update(received);

        tracing::info!(node = %self.node_id, op = %request.op, time, "lamport operation requested");

        sleep(self.processing_delay()).await;

        if self.should_fail(&request) {
            return CalcResponse {
                success: false,
                result: None,
                error: Some("simulated server error".to_string()),
                clock: self.stamp(),
            };
        }

        let result = request.op.apply(request.operand1, request.operand2);
        tracing::info!(node = %self.node_id, op = %request.op, result, clock = %self.clock, "lamport operation complete");

        CalcResponse {
            success: true,
            result: Some(result),
            error: None,
            clock: self.stamp(),
        }
    }

    fn stamp(&self) -> ClockSnapshot {
        let mut clock = ClockSnapshot::default();
        clock.insert(self.node_id.clone(), self.clock.time());
        clock
    }

    fn processing_delay(&self) -> Duration {
        let (min, max) = self.simulation.delay_bounds();
        if max <= min {
            return min;
        }
        let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
        Duration::from_millis(millis as u64)
    }

    fn should_fail(&self, request: &CalcRequest) -> bool {
        if request.operand1 < 0.0 || request.operand2 < 0.0 {
            return true;
        }
        if self.simulation.failure_rate <= 0.0 {
            return false;
        }
        rand::thread_rng().gen::<f64>() < self.simulation.failure_rate
    }
}
