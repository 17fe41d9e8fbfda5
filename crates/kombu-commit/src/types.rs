//! Transaction wire types.
//!
//! Ephemeral, scoped to a single coordinator run; never persisted.

use kombu_clock::ClockSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a two-phase commit exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxnPhase {
    /// Ask every participant whether it can commit
    Prepare,

    /// All voted yes: apply the operation
    Commit,

    /// At least one no or failure: roll everyone back
    Abort,
}

/// The arithmetic operation a transaction applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Square,
    Cube,
    Multiply,
}

impl Operation {
    /// Compute the operation over its operands.
    ///
    /// Square and cube only use the first operand.
    pub fn apply(&self, operand1: f64, operand2: f64) -> f64 {
        match self {
            Operation::Square => operand1 * operand1,
            Operation::Cube => operand1 * operand1 * operand1,
            Operation::Multiply => operand1 * operand2,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Square => write!(f, "square"),
            Operation::Cube => write!(f, "cube"),
            Operation::Multiply => write!(f, "multiply"),
        }
    }
}

/// A request sent to one participant during one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnRequest {
    /// Transaction id, shared by all phases of one run
    pub txn_id: String,

    /// Which phase this request belongs to
    pub phase: TxnPhase,

    /// Operation under transaction
    pub op: Operation,

    /// First operand
    pub operand1: f64,

    /// Second operand (multiply only)
    pub operand2: f64,

    /// Coordinator clock snapshot at send time (empty when unclocked)
    #[serde(default)]
    pub clock: ClockSnapshot,
}

/// A participant's answer for one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnResponse {
    /// Transaction id echoed back
    pub txn_id: String,

    /// Prepare: the vote. Commit/Abort: whether the phase was applied.
    pub success: bool,

    /// Human-readable detail
    pub message: String,

    /// Operation result, present only on a successful Commit
    pub result: Option<f64>,

    /// Participant clock snapshot at reply time (empty when unclocked)
    #[serde(default)]
    pub clock: ClockSnapshot,
}
