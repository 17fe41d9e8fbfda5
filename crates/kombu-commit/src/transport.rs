//! Participant transport seam.
//!
//! The coordinator never talks to a network directly; it goes through
//! [`ParticipantTransport`]. Production would put an RPC client behind
//! this trait. The toolkit ships [`SimulatedTransport`], which models a
//! fallible participant in-process: a fixed exchange delay, a
//! configurable prepare rejection rate, and a seedable RNG so tests
//! control the fault source precisely.

use crate::error::{CommitError, Result};
use crate::types::{TxnPhase, TxnRequest, TxnResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::sleep;

/// Transport abstraction for reaching 2PC participants.
#[async_trait]
pub trait ParticipantTransport: Send + Sync + 'static {
    /// Deliver one phase request to one participant and await its answer.
    async fn send(&self, participant: &str, request: TxnRequest) -> Result<TxnResponse>;
}

/// Configuration for the simulated participant transport.
#[derive(Debug, Clone)]
pub struct SimulatedTransportConfig {
    /// Simulated network delay per request.
    /// Default: 100ms
    pub exchange_delay: Duration,

    /// Probability that a participant votes no in Prepare (0.0 - 1.0).
    /// Default: 0.2
    pub prepare_reject_rate: f64,
}

impl Default for SimulatedTransportConfig {
    fn default() -> Self {
        Self {
            exchange_delay: Duration::from_millis(100),
            prepare_reject_rate: 0.2,
        }
    }
}

impl SimulatedTransportConfig {
    /// Set the simulated exchange delay.
    pub fn with_exchange_delay(mut self, delay: Duration) -> Self {
        self.exchange_delay = delay;
        self
    }

    /// Set the prepare rejection probability.
    pub fn with_prepare_reject_rate(mut self, rate: f64) -> Self {
        self.prepare_reject_rate = rate.clamp(0.0, 1.0);
        self
    }
}

/// In-process participant simulation.
///
/// One RNG drives all fault decisions, owned by the transport and seeded
/// explicitly when determinism is wanted. Rejection is independent per
/// request — a given participant address carries no sticky failure
/// behavior.
pub struct SimulatedTransport {
    /// Delay and fault parameters
    config: SimulatedTransportConfig,

    /// Injected fault source
    rng: Mutex<StdRng>,
}

impl SimulatedTransport {
    /// Create a transport with an entropy-seeded RNG.
    pub fn new(config: SimulatedTransportConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a transport with a fixed RNG seed, for reproducible runs.
    pub fn with_seed(config: SimulatedTransportConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn draw_prepare_vote(&self) -> bool {
        if self.config.prepare_reject_rate <= 0.0 {
            return true;
        }
        self.rng.lock().gen::<f64>() >= self.config.prepare_reject_rate
    }
}

#[async_trait]
impl ParticipantTransport for SimulatedTransport {
    async fn send(&self, participant: &str, request: TxnRequest) -> Result<TxnResponse> {
        sleep(self.config.exchange_delay).await;

        let response = match request.phase {
            TxnPhase::Prepare => {
                let vote = self.draw_prepare_vote();
                tracing::debug!(
                    participant,
                    txn = %request.txn_id,
                    vote = if vote { "yes" } else { "no" },
                    "prepare vote"
                );
                TxnResponse {
                    txn_id: request.txn_id,
                    success: vote,
                    message: if vote {
                        "ready to commit".to_string()
                    } else {
                        "cannot commit".to_string()
                    },
                    result: None,
                    clock: Default::default(),
                }
            }
            TxnPhase::Commit => {
                let result = request.op.apply(request.operand1, request.operand2);
                TxnResponse {
                    txn_id: request.txn_id,
                    success: true,
                    message: "committed".to_string(),
                    result: Some(result),
                    clock: Default::default(),
                }
            }
            TxnPhase::Abort => TxnResponse {
                txn_id: request.txn_id,
                success: true,
                message: "aborted".to_string(),
                result: None,
                clock: Default::default(),
            },
        };

        Ok(response)
    }
}
