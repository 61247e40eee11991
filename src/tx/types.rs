//! Transaction identifiers and states.

use std::fmt;

/// Identifies one transaction within a [`TransactionManager`](super::TransactionManager).
///
/// Issued in increasing order from 1; later transactions compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(u64);

impl TxId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Started, neither committed nor aborted.
    InProgress,
    /// Writes are applied and visible.
    Committed,
    /// Writes were discarded.
    Aborted,
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxState::InProgress => "in progress",
            TxState::Committed => "committed",
            TxState::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}
