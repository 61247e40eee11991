//! Transaction errors.

use thiserror::Error;

use super::types::{TxId, TxState};

/// Failures reported by the [`TransactionManager`](super::TransactionManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    /// The manager never issued this id.
    #[error("transaction {0} not found")]
    TransactionNotFound(TxId),
    /// Commit or abort of a transaction that already finished.
    #[error("transaction {txid} is already {current}, cannot become {attempted}")]
    InvalidStateTransition {
        txid: TxId,
        current: TxState,
        attempted: TxState,
    },
}
