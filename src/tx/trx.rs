//! Session-owned transaction handles.

use std::sync::Arc;

use tracing::warn;

use crate::catalog::{Record, Table};

use super::error::TxError;
use super::manager::TransactionManager;
use super::types::TxId;

/// Narrow transactional interface consumed by the executor.
///
/// Operators only read through it ([`visible_records`](Transaction::visible_records));
/// writers insert records and the owner decides between commit and rollback.
pub trait Transaction {
    /// The transaction ID, or `None` if not started.
    fn id(&self) -> Option<TxId>;

    /// Begins the transaction unless it is already running.
    fn start_if_need(&mut self) -> Result<(), TxError>;

    /// Buffers `record` for insertion into `table` (starting the transaction
    /// if needed). The record becomes visible to others on commit.
    fn insert_record(&mut self, table: &Arc<Table>, record: Record) -> Result<(), TxError>;

    /// Records of `table` visible to this transaction: everything committed
    /// plus this transaction's own pending inserts.
    fn visible_records(&self, table: &Table) -> Vec<Record>;

    /// Applies pending writes and ends the transaction. No-op if not started.
    fn commit(&mut self) -> Result<(), TxError>;

    /// Discards pending writes and ends the transaction. No-op if not started.
    fn rollback(&mut self) -> Result<(), TxError>;
}

/// In-memory transaction with buffered writes.
///
/// # Cleanup
///
/// Dropping a started `Trx` aborts it, so an abandoned handle never leaves an
/// in-progress entry behind in the transaction manager.
pub struct Trx {
    manager: Arc<TransactionManager>,
    txid: Option<TxId>,
    pending: Vec<(Arc<Table>, Record)>,
}

impl Trx {
    /// Creates an unstarted transaction handle.
    pub fn new(manager: Arc<TransactionManager>) -> Self {
        Self {
            manager,
            txid: None,
            pending: Vec::new(),
        }
    }

    /// Number of buffered inserts.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Transaction for Trx {
    fn id(&self) -> Option<TxId> {
        self.txid
    }

    fn start_if_need(&mut self) -> Result<(), TxError> {
        if self.txid.is_none() {
            self.txid = Some(self.manager.begin());
        }
        Ok(())
    }

    fn insert_record(&mut self, table: &Arc<Table>, record: Record) -> Result<(), TxError> {
        self.start_if_need()?;
        self.pending.push((Arc::clone(table), record));
        Ok(())
    }

    fn visible_records(&self, table: &Table) -> Vec<Record> {
        let mut records = table.records();
        records.extend(
            self.pending
                .iter()
                .filter(|(t, _)| t.id() == table.id())
                .map(|(_, r)| r.clone()),
        );
        records
    }

    fn commit(&mut self) -> Result<(), TxError> {
        let Some(txid) = self.txid else {
            return Ok(());
        };
        self.manager.commit(txid)?;
        self.txid = None;
        for (table, record) in self.pending.drain(..) {
            table.append_records([record]);
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), TxError> {
        let Some(txid) = self.txid else {
            return Ok(());
        };
        self.pending.clear();
        self.txid = None;
        self.manager.abort(txid)
    }
}

impl Drop for Trx {
    fn drop(&mut self) {
        if let Err(e) = self.rollback() {
            warn!(error = %e, "failed to abort dropped transaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttrInfo, Db, StorageFormat};
    use crate::datum::{Type, Value};
    use crate::tx::TxState;

    fn setup() -> (Db, Arc<Table>) {
        let db = Db::new("sys");
        let table = db
            .create_table("t", &[AttrInfo::new("v", Type::Int, 4)], &[], StorageFormat::Row)
            .unwrap();
        (db, table)
    }

    fn record(table: &Table, v: i32) -> Record {
        table.make_record(1, &[Value::Int(v)]).unwrap()
    }

    #[test]
    fn test_insert_starts_transaction() {
        let (db, table) = setup();
        let mut trx = Trx::new(Arc::clone(db.tx_manager()));
        assert_eq!(trx.id(), None);
        trx.insert_record(&table, record(&table, 1)).unwrap();
        let txid = trx.id().unwrap();
        assert_eq!(db.tx_manager().state(txid), Some(TxState::InProgress));
    }

    #[test]
    fn test_pending_rows_visible_only_to_owner() {
        let (db, table) = setup();
        let mut trx = Trx::new(Arc::clone(db.tx_manager()));
        let other = Trx::new(Arc::clone(db.tx_manager()));
        trx.insert_record(&table, record(&table, 1)).unwrap();

        assert_eq!(trx.visible_records(&table).len(), 1);
        assert_eq!(other.visible_records(&table).len(), 0);
        assert_eq!(table.record_count(), 0);
    }

    #[test]
    fn test_commit_applies_writes() {
        let (db, table) = setup();
        let mut trx = Trx::new(Arc::clone(db.tx_manager()));
        trx.start_if_need().unwrap();
        let txid = trx.id().unwrap();
        trx.insert_record(&table, record(&table, 1)).unwrap();
        trx.insert_record(&table, record(&table, 2)).unwrap();
        trx.commit().unwrap();

        assert_eq!(trx.id(), None);
        assert_eq!(trx.pending_count(), 0);
        assert_eq!(table.record_count(), 2);
        assert_eq!(db.tx_manager().state(txid), Some(TxState::Committed));
    }

    #[test]
    fn test_rollback_discards_writes() {
        let (db, table) = setup();
        let mut trx = Trx::new(Arc::clone(db.tx_manager()));
        trx.insert_record(&table, record(&table, 1)).unwrap();
        let txid = trx.id().unwrap();
        trx.rollback().unwrap();

        assert_eq!(table.record_count(), 0);
        assert_eq!(db.tx_manager().state(txid), Some(TxState::Aborted));
    }

    #[test]
    fn test_commit_and_rollback_unstarted_are_noops() {
        let (db, _table) = setup();
        let mut trx = Trx::new(Arc::clone(db.tx_manager()));
        trx.commit().unwrap();
        trx.rollback().unwrap();
        assert_eq!(db.tx_manager().active_count(), 0);
    }

    #[test]
    fn test_drop_aborts() {
        let (db, table) = setup();
        let txid = {
            let mut trx = Trx::new(Arc::clone(db.tx_manager()));
            trx.insert_record(&table, record(&table, 1)).unwrap();
            trx.id().unwrap()
        };
        assert_eq!(db.tx_manager().state(txid), Some(TxState::Aborted));
        assert_eq!(table.record_count(), 0);
    }
}
