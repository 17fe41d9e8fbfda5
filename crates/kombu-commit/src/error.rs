//! Two-phase commit error types.

use thiserror::Error;

/// Coordinator errors.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The transaction was aborted (prepare rejection or internal failure).
    #[error("Transaction {txn_id} aborted: {reason}")]
    Aborted { txn_id: String, reason: String },

    /// Every participant committed but none returned a result.
    ///
    /// The transaction IS committed; only the representative result is
    /// missing. Surfaced explicitly rather than as a silent zero.
    #[error("Transaction {txn_id} committed but no participant returned a result")]
    NoCommitResult { txn_id: String },

    /// A participant call failed at the transport layer.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Two-phase commit result type.
pub type Result<T> = std::result::Result<T, CommitError>;
