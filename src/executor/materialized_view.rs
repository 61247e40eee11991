//! CREATE MATERIALIZED VIEW.
//!
//! The view is a regular table whose schema is inferred from the defining
//! query's select list and whose rows are the query's result at creation time.
//! Population runs under the session's transaction; outside multi-operation
//! mode the statement commits on success and rolls back on failure.
//!
//! A failure after the table has been created leaves the (empty) table in
//! place.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::catalog::{AttrInfo, StorageFormat, Table};
use crate::config::ExecutionMode;
use crate::datum::Value;
use crate::session::Session;
use crate::sql::CreateMaterializedViewStmt;
use crate::tx::{Transaction, Trx};

use super::binder::{BoundSelect, bind_select};
use super::error::ExecutorError;
use super::expr::BoundExpr;
use super::operator::PhysicalOperator;
use super::plan::{LocalOptimizer, Optimizer};
use super::runner::{Output, drain};

/// Turns an expression label into a column name.
///
/// The label is lower-cased and every character outside `[a-z0-9_]` becomes
/// `_`. An empty label becomes `c<position>` and a leading digit gets a `c_`
/// prefix. `position` is 1-based.
pub fn sanitize_column_name(raw: &str, position: usize) -> String {
    let name: String = raw
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        format!("c{}", position)
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("c_{}", name)
    } else {
        name
    }
}

/// User-facing label: the raw label, or `c<position>` if it is blank.
fn display_name(raw: &str, position: usize) -> String {
    if raw.trim().is_empty() {
        format!("c{}", position)
    } else {
        raw.to_string()
    }
}

/// Derives the view's columns and display names from the select list.
///
/// Column names that repeat after sanitizing get `_2`, `_3`, ... appended in
/// order of appearance. Lengths fall back to the type's default when the
/// expression does not report one.
pub fn infer_view_schema(exprs: &[BoundExpr]) -> (Vec<AttrInfo>, Vec<String>) {
    let mut attrs = Vec::with_capacity(exprs.len());
    let mut display_names = Vec::with_capacity(exprs.len());
    let mut used = HashSet::new();

    for (i, expr) in exprs.iter().enumerate() {
        let label = expr.name();
        let ty = expr.value_type();
        let len = match expr.value_length() {
            0 => ty.default_length(),
            n => n,
        };
        display_names.push(display_name(&label, i + 1));

        let base = sanitize_column_name(&label, i + 1);
        let mut name = base.clone();
        let mut suffix = 1;
        while !used.insert(name.clone()) {
            suffix += 1;
            name = format!("{}_{}", base, suffix);
        }
        attrs.push(AttrInfo::new(name, ty, len));
    }
    (attrs, display_names)
}

/// Executes CREATE MATERIALIZED VIEW statements.
pub struct CreateMaterializedViewExecutor<O = LocalOptimizer> {
    optimizer: O,
}

impl Default for CreateMaterializedViewExecutor<LocalOptimizer> {
    fn default() -> Self {
        Self::new(LocalOptimizer)
    }
}

impl<O: Optimizer> CreateMaterializedViewExecutor<O> {
    pub fn new(optimizer: O) -> Self {
        Self { optimizer }
    }

    /// Creates the view table and fills it with the defining query's rows.
    ///
    /// # Errors
    ///
    /// - [`ExecutorError::DatabaseNotSelected`] without a current database
    /// - binding errors of the defining query
    /// - [`ExecutorError::InvalidArgument`] for an empty select list
    /// - [`ExecutorError::Catalog`] if the table cannot be created
    /// - [`ExecutorError::Internal`] if the plan's output width does not match
    ///   the inferred schema
    /// - any error raised while running the plan or inserting rows
    pub fn execute(
        &self,
        session: &mut Session,
        stmt: &CreateMaterializedViewStmt,
    ) -> Result<(), ExecutorError> {
        let db = Arc::clone(session.current_db().ok_or(ExecutorError::DatabaseNotSelected)?);
        let select = bind_select(&db, &stmt.query)?;
        if select.query_expressions.is_empty() {
            return Err(ExecutorError::InvalidArgument(
                "materialized view needs at least one column".into(),
            ));
        }

        let (attrs, display_names) = infer_view_schema(&select.query_expressions);
        let table = db.create_table(&stmt.name, &attrs, &[], StorageFormat::Row)?;
        table.set_field_display_names(display_names)?;

        let mode = session.execution_mode();
        let multi_operation = session.is_trx_multi_operation_mode();
        let trx = session.current_trx().ok_or(ExecutorError::DatabaseNotSelected)?;

        let result = self.populate(&select, mode, trx, &table);
        let result = if multi_operation {
            result
        } else {
            finish(trx, result)
        };
        if !multi_operation {
            session.destroy_trx();
        }
        if result.is_ok() {
            info!(view = %stmt.name, columns = attrs.len(), "materialized view created");
        }
        result
    }

    fn populate(
        &self,
        select: &BoundSelect,
        mode: ExecutionMode,
        trx: &mut Trx,
        table: &Arc<Table>,
    ) -> Result<(), ExecutorError> {
        trx.start_if_need()?;
        let mut root = self.optimizer.optimize(select, mode)?;
        let result = insert_all(&mut root, mode, trx, table);
        match (result, root.close()) {
            (Ok(count), Ok(())) => {
                debug!(rows = count, table = %table.name(), "materialized view populated");
                Ok(())
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "failed to close plan after error");
                }
                Err(e)
            }
        }
    }
}

/// Opens `root` and inserts every output row into `table`.
fn insert_all(
    root: &mut PhysicalOperator,
    mode: ExecutionMode,
    trx: &mut Trx,
    table: &Arc<Table>,
) -> Result<usize, ExecutorError> {
    let expected = table.field_num();
    root.open(&*trx)?;

    let mut count = 0;
    let mut insert = |values: &[Value]| -> Result<(), ExecutorError> {
        let record = table.make_record(expected, values)?;
        trx.insert_record(table, record)?;
        count += 1;
        Ok(())
    };
    drain(root, mode, |output| match output {
        Output::Tuple(tuple) => {
            if tuple.cell_num() != expected {
                return Err(width_mismatch(tuple.cell_num(), expected));
            }
            insert(tuple.values())
        }
        Output::Chunk(chunk) => {
            if chunk.column_num() != expected {
                return Err(width_mismatch(chunk.column_num(), expected));
            }
            for row in 0..chunk.rows() {
                let values = chunk.row_values(row).ok_or_else(|| {
                    ExecutorError::Internal(format!("row {} missing from chunk", row))
                })?;
                insert(&values)?;
            }
            Ok(())
        }
    })?;
    Ok(count)
}

fn width_mismatch(found: usize, expected: usize) -> ExecutorError {
    ExecutorError::Internal(format!(
        "plan produced {} columns, view has {}",
        found, expected
    ))
}

/// Commits on success, rolls back on failure.
fn finish(trx: &mut Trx, result: Result<(), ExecutorError>) -> Result<(), ExecutorError> {
    match result {
        Ok(()) => Ok(trx.commit()?),
        Err(e) => {
            if let Err(rollback_err) = trx.rollback() {
                error!(error = %rollback_err, "failed to roll back materialized view population");
            }
            Err(e)
        }
    }
}
