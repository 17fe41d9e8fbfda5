//! The two-phase commit coordinator.

use crate::error::{CommitError, Result};
use crate::transport::ParticipantTransport;
use crate::types::{Operation, TxnPhase, TxnRequest, TxnResponse};
use kombu_clock::{ClockSnapshot, VectorClock};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Drives all-or-nothing transactions across a fixed participant list.
///
/// Optionally carries a vector clock: when present, every outgoing
/// request is increment-then-stamped and every response snapshot is
/// merged back in, success or not.
pub struct Coordinator {
    /// Participant identifiers, in declaration order
    participants: Vec<String>,

    /// Transport used to reach participants
    transport: Arc<dyn ParticipantTransport>,

    /// Optional clock for request stamping
    clock: Option<Arc<VectorClock>>,
}

impl Coordinator {
    /// Create a coordinator over the given participants.
    pub fn new(participants: Vec<String>, transport: Arc<dyn ParticipantTransport>) -> Self {
        Self {
            participants,
            transport,
            clock: None,
        }
    }

    /// Attach a vector clock for request stamping.
    pub fn with_clock(mut self, clock: Arc<VectorClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Get the participant list.
    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    /// Execute one distributed transaction.
    ///
    /// Prepare fans out to every participant and waits for all votes; a
    /// participant call that fails counts as a no. A unanimous yes leads
    /// to Commit, anything else to Abort. The returned value is one
    /// representative commit result — the first participant in
    /// declaration order that produced one; which participant that is, is
    /// arbitrary by contract.
    pub async fn execute(&self, op: Operation, operand1: f64, operand2: f64) -> Result<f64> {
        let txn_id = generate_txn_id();
        tracing::info!(txn = %txn_id, %op, "starting 2PC transaction");

        let votes = self.prepare_phase(&txn_id, op, operand1, operand2).await;
        let all_yes = self.participants.iter().all(|p| {
            votes
                .get(p)
                .map(|response| response.success)
                .unwrap_or(false)
        });

        if !all_yes {
            tracing::warn!(txn = %txn_id, "prepare rejected, aborting");
            self.abort_phase(&txn_id, op, operand1, operand2).await;
            return Err(CommitError::Aborted {
                txn_id,
                reason: "prepare phase rejected".to_string(),
            });
        }

        tracing::info!(txn = %txn_id, "all participants voted yes, committing");
        match self.commit_phase(&txn_id, op, operand1, operand2).await {
            Some(result) => {
                tracing::info!(txn = %txn_id, result, "transaction committed");
                Ok(result)
            }
            None => Err(CommitError::NoCommitResult { txn_id }),
        }
    }

    /// Fan out Prepare and collect every vote (full barrier).
    ///
    /// Transport failures are recorded as no votes, never propagated.
    async fn prepare_phase(
        &self,
        txn_id: &str,
        op: Operation,
        operand1: f64,
        operand2: f64,
    ) -> HashMap<String, TxnResponse> {
        let votes: Arc<Mutex<HashMap<String, TxnResponse>>> = Arc::new(Mutex::new(HashMap::new()));

        let mut handles = Vec::new();
        for participant in &self.participants {
            let request = TxnRequest {
                txn_id: txn_id.to_string(),
                phase: TxnPhase::Prepare,
                op,
                operand1,
                operand2,
                clock: self.stamp(),
            };
            let transport = self.transport.clone();
            let participant = participant.clone();
            let votes = votes.clone();
            let txn = txn_id.to_string();

            handles.push(tokio::spawn(async move {
                match transport.send(&participant, request).await {
                    Ok(response) => {
                        tracing::debug!(
                            txn = %txn,
                            participant = %participant,
                            vote = if response.success { "yes" } else { "no" },
                            "prepare response"
                        );
                        votes.lock().insert(participant, response);
                    }
                    Err(err) => {
                        tracing::warn!(txn = %txn, participant = %participant, error = %err, "prepare failed, counting as no");
                        votes.lock().insert(
                            participant,
                            TxnResponse {
                                txn_id: txn,
                                success: false,
                                message: err.to_string(),
                                result: None,
                                clock: ClockSnapshot::default(),
                            },
                        );
                    }
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let votes = Arc::try_unwrap(votes)
            .map(Mutex::into_inner)
            .unwrap_or_else(|votes| votes.lock().clone());
        self.merge_responses(votes.values());
        votes
    }

    /// Fan out Commit and return one representative result.
    ///
    /// Per-participant failures are logged and ignored; the phase is
    /// never retried.
    async fn commit_phase(
        &self,
        txn_id: &str,
        op: Operation,
        operand1: f64,
        operand2: f64,
    ) -> Option<f64> {
        let results: Arc<Mutex<HashMap<String, TxnResponse>>> = Arc::new(Mutex::new(HashMap::new()));

        let mut handles = Vec::new();
        for participant in &self.participants {
            let request = TxnRequest {
                txn_id: txn_id.to_string(),
                phase: TxnPhase::Commit,
                op,
                operand1,
                operand2,
                clock: self.stamp(),
            };
            let transport = self.transport.clone();
            let participant = participant.clone();
            let results = results.clone();
            let txn = txn_id.to_string();

            handles.push(tokio::spawn(async move {
                match transport.send(&participant, request).await {
                    Ok(response) => {
                        tracing::debug!(txn = %txn, participant = %participant, result = ?response.result, "commit response");
                        results.lock().insert(participant, response);
                    }
                    Err(err) => {
                        tracing::warn!(txn = %txn, participant = %participant, error = %err, "commit failed");
                    }
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let results = Arc::try_unwrap(results)
            .map(Mutex::into_inner)
            .unwrap_or_else(|results| results.lock().clone());
        self.merge_responses(results.values());

        self.participants
            .iter()
            .find_map(|p| results.get(p).and_then(|response| response.result))
    }

    /// Fan out Abort, best-effort: failures are logged, never retried.
    async fn abort_phase(&self, txn_id: &str, op: Operation, operand1: f64, operand2: f64) {
        let mut handles = Vec::new();
        for participant in &self.participants {
            let request = TxnRequest {
                txn_id: txn_id.to_string(),
                phase: TxnPhase::Abort,
                op,
                operand1,
                operand2,
                clock: self.stamp(),
            };
            let transport = self.transport.clone();
            let participant = participant.clone();
            let txn = txn_id.to_string();

            handles.push(tokio::spawn(async move {
                match transport.send(&participant, request).await {
                    Ok(_) => {
                        tracing::debug!(txn = %txn, participant = %participant, "participant aborted");
                    }
                    Err(err) => {
                        tracing::warn!(txn = %txn, participant = %participant, error = %err, "abort failed");
                    }
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Increment-then-snapshot when a clock is attached.
    fn stamp(&self) -> ClockSnapshot {
        match &self.clock {
            Some(clock) => {
                clock.increment();
                clock.snapshot()
            }
            None => ClockSnapshot::default(),
        }
    }

    /// Merge response snapshots back into the attached clock.
    fn merge_responses<'a>(&self, responses: impl Iterator<Item = &'a TxnResponse>) {
        if let Some(clock) = &self.clock {
            for response in responses {
                if !response.clock.is_empty() {
                    clock.merge(&response.clock);
                }
            }
        }
    }
}

/// Generate an 8-hex-char transaction id.
fn generate_txn_id() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}
