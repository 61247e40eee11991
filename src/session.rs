//! Client session state.
//!
//! A [`Session`] tracks the current database, the session's transaction and
//! its [`SessionConfig`]. Statements run through [`Session::execute`].
//!
//! # Transactions
//!
//! Outside multi-operation mode every statement runs in its own transaction,
//! which the statement commits or rolls back itself before releasing it.
//! [`Session::begin`] switches to multi-operation mode: statements then share
//! one transaction until [`Session::commit`] or [`Session::rollback`].
//!
//! Dropping a session drops its transaction handle, which rolls back any
//! uncommitted work.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::Db;
use crate::config::{ExecutionMode, SessionConfig};
use crate::executor::{
    self, ColumnDesc, CreateMaterializedViewExecutor, ExecutorError, LocalOptimizer, Optimizer, Tuple,
};
use crate::sql::Statement;
use crate::tx::{Transaction, Trx};

/// Result of executing a statement.
#[derive(Debug)]
pub enum QueryResult {
    /// Statement completed without producing rows.
    Command {
        /// Completion tag, e.g. `CREATE MATERIALIZED VIEW`.
        tag: String,
    },
    /// Query returned rows.
    Rows {
        /// Column metadata for the result set.
        columns: Vec<ColumnDesc>,
        /// Result rows.
        rows: Vec<Tuple>,
    },
}

impl QueryResult {
    fn command(tag: impl Into<String>) -> Self {
        Self::Command { tag: tag.into() }
    }
}

/// A client session.
pub struct Session {
    db: Option<Arc<Db>>,
    trx: Option<Trx>,
    config: SessionConfig,
}

impl Session {
    /// Creates a session without a current database.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            db: None,
            trx: None,
            config,
        }
    }

    /// Creates a session using `db`.
    pub fn with_db(db: Arc<Db>, config: SessionConfig) -> Self {
        Self {
            db: Some(db),
            trx: None,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn current_db(&self) -> Option<&Arc<Db>> {
        self.db.as_ref()
    }

    /// Switches the current database, dropping the session's transaction.
    pub fn set_current_db(&mut self, db: Arc<Db>) {
        self.destroy_trx();
        self.db = Some(db);
    }

    /// The session's transaction, created on first use.
    ///
    /// Returns `None` when no database is selected.
    pub fn current_trx(&mut self) -> Option<&mut Trx> {
        let db = self.db.as_ref()?;
        Some(
            self.trx
                .get_or_insert_with(|| Trx::new(Arc::clone(db.tx_manager()))),
        )
    }

    /// Releases the session's transaction. Uncommitted work is rolled back.
    pub fn destroy_trx(&mut self) {
        self.trx = None;
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.config.execution_mode
    }

    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.config.execution_mode = mode;
    }

    /// Whether queries run in chunk mode.
    pub fn used_chunk_mode(&self) -> bool {
        self.config.execution_mode == ExecutionMode::Chunk
    }

    /// Whether statements share an explicit transaction.
    pub fn is_trx_multi_operation_mode(&self) -> bool {
        self.config.multi_operation_mode
    }

    pub fn set_trx_multi_operation_mode(&mut self, enabled: bool) {
        self.config.multi_operation_mode = enabled;
    }

    /// Begins an explicit transaction.
    ///
    /// If already in one, this is a no-op.
    pub fn begin(&mut self) -> Result<(), ExecutorError> {
        let trx = self.current_trx().ok_or(ExecutorError::DatabaseNotSelected)?;
        trx.start_if_need()?;
        self.config.multi_operation_mode = true;
        Ok(())
    }

    /// Commits the explicit transaction and leaves multi-operation mode.
    pub fn commit(&mut self) -> Result<(), ExecutorError> {
        self.config.multi_operation_mode = false;
        let result = match self.trx.as_mut() {
            Some(trx) => trx.commit(),
            None => Ok(()),
        };
        self.destroy_trx();
        Ok(result?)
    }

    /// Rolls back the explicit transaction and leaves multi-operation mode.
    pub fn rollback(&mut self) -> Result<(), ExecutorError> {
        self.config.multi_operation_mode = false;
        let result = match self.trx.as_mut() {
            Some(trx) => trx.rollback(),
            None => Ok(()),
        };
        self.destroy_trx();
        Ok(result?)
    }

    /// Executes a statement.
    pub fn execute(&mut self, stmt: &Statement) -> Result<QueryResult, ExecutorError> {
        match stmt {
            Statement::Select(select) => {
                let db = Arc::clone(self.current_db().ok_or(ExecutorError::DatabaseNotSelected)?);
                let bound = executor::bind_select(&db, select)?;
                let columns = bound.output_columns();
                let mode = self.execution_mode();
                let mut root = LocalOptimizer.optimize(&bound, mode)?;

                let multi_operation = self.is_trx_multi_operation_mode();
                let trx = self.current_trx().ok_or(ExecutorError::DatabaseNotSelected)?;
                let result = executor::collect_rows(&mut root, &*trx, mode);
                if !multi_operation {
                    self.destroy_trx();
                }
                let rows = result?;
                debug!(rows = rows.len(), "select finished");
                Ok(QueryResult::Rows { columns, rows })
            }
            Statement::CreateMaterializedView(create) => {
                CreateMaterializedViewExecutor::new(LocalOptimizer).execute(self, create)?;
                Ok(QueryResult::command("CREATE MATERIALIZED VIEW"))
            }
        }
    }
}
