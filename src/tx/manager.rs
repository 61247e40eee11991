//! Transaction ID allocation and lifecycle tracking.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::error::TxError;
use super::types::{TxId, TxState};

struct Registry {
    last_txid: u64,
    states: HashMap<TxId, TxState>,
}

/// Hands out sequential [`TxId`]s (starting at 1) and records whether each
/// transaction is still running, committed or aborted.
///
/// Finished entries are kept for the manager's lifetime so that
/// [`state`](Self::state) can report them.
pub struct TransactionManager {
    registry: Mutex<Registry>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                last_txid: 0,
                states: HashMap::new(),
            }),
        }
    }

    /// Registers a new in-progress transaction.
    pub fn begin(&self) -> TxId {
        let mut registry = self.registry.lock();
        registry.last_txid += 1;
        let txid = TxId::new(registry.last_txid);
        registry.states.insert(txid, TxState::InProgress);
        txid
    }

    pub fn commit(&self, txid: TxId) -> Result<(), TxError> {
        self.finish(txid, TxState::Committed)
    }

    pub fn abort(&self, txid: TxId) -> Result<(), TxError> {
        self.finish(txid, TxState::Aborted)
    }

    /// Only in-progress transactions may finish.
    fn finish(&self, txid: TxId, outcome: TxState) -> Result<(), TxError> {
        let mut registry = self.registry.lock();
        let state = registry
            .states
            .get_mut(&txid)
            .ok_or(TxError::TransactionNotFound(txid))?;
        if *state != TxState::InProgress {
            return Err(TxError::InvalidStateTransition {
                txid,
                current: *state,
                attempted: outcome,
            });
        }
        *state = outcome;
        Ok(())
    }

    /// State of `txid`, or `None` if this manager never issued it.
    pub fn state(&self, txid: TxId) -> Option<TxState> {
        self.registry.lock().states.get(&txid).copied()
    }

    /// Number of transactions neither committed nor aborted.
    pub fn active_count(&self) -> usize {
        let registry = self.registry.lock();
        registry
            .states
            .values()
            .filter(|s| matches!(s, TxState::InProgress))
            .count()
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
