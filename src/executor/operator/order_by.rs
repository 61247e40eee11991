use std::cmp::Ordering;
use std::fmt;

use tracing::{debug, warn};

use crate::chunk::{Chunk, Column};
use crate::config::ExecutionMode;
use crate::datum::Value;
use crate::tx::Transaction;

use super::super::error::ExecutorError;
use super::super::expr::BoundExpr;
use super::super::tuple::{ColumnDesc, Tuple};
use super::PhysicalOperator;

/// One component of a composite sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByKey {
    pub expr: BoundExpr,
    pub ascending: bool,
}

impl OrderByKey {
    pub fn new(expr: BoundExpr, ascending: bool) -> Self {
        Self { expr, ascending }
    }
}

impl fmt::Display for OrderByKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.ascending { "ASC" } else { "DESC" };
        write!(f, "{} {}", self.expr, direction)
    }
}

/// A buffered input row with its sort key evaluated once up front.
struct MaterializedRow {
    values: Tuple,
    order_by_values: Vec<Value>,
}

/// Compares two key vectors left to right; the first unequal key decides.
fn compare_keys(keys: &[OrderByKey], a: &[Value], b: &[Value]) -> Ordering {
    for (key, (l, r)) in keys.iter().zip(a.iter().zip(b)) {
        let ord = l.compare(r);
        let ord = if key.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Full-materialization sort.
///
/// `open` drains the child, evaluating the sort key of every row, and sorts
/// the buffered rows. Ties keep no particular order. The operator is built
/// for one protocol and reports the other as unimplemented.
pub struct OrderBy {
    child: Box<PhysicalOperator>,
    keys: Vec<OrderByKey>,
    mode: ExecutionMode,
    rows: Vec<MaterializedRow>,
    cursor: usize,
    current: Option<usize>,
    template: Chunk,
    output: Chunk,
}

impl OrderBy {
    pub fn new(child: PhysicalOperator, keys: Vec<OrderByKey>, mode: ExecutionMode) -> Self {
        Self {
            child: Box::new(child),
            keys,
            mode,
            rows: Vec::new(),
            cursor: 0,
            current: None,
            template: Chunk::new(),
            output: Chunk::new(),
        }
    }

    pub fn child(&self) -> &PhysicalOperator {
        &self.child
    }

    pub fn keys(&self) -> &[OrderByKey] {
        &self.keys
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub(super) fn open(&mut self, trx: &dyn Transaction) -> Result<(), ExecutorError> {
        self.reset();
        self.child.open(trx).inspect_err(|e| {
            warn!(error = %e, operator = "OrderBy", "failed to open child operator");
        })?;
        match self.mode {
            ExecutionMode::Tuple => self.materialize_rows()?,
            ExecutionMode::Chunk => self.materialize_chunks()?,
        }
        self.sort()?;
        debug!(rows = self.rows.len(), "order by materialized");
        Ok(())
    }

    fn materialize_rows(&mut self) -> Result<(), ExecutorError> {
        while self.child.next()? {
            let tuple = self.child.current_tuple().ok_or_else(|| {
                ExecutorError::Internal("child returned a row but exposes no tuple".into())
            })?;
            let order_by_values = self
                .keys
                .iter()
                .map(|k| k.expr.get_value(tuple))
                .collect::<Result<Vec<_>, _>>()?;
            self.rows.push(MaterializedRow {
                values: tuple.clone(),
                order_by_values,
            });
        }
        Ok(())
    }

    fn materialize_chunks(&mut self) -> Result<(), ExecutorError> {
        let mut input = Chunk::new();
        let mut key_columns: Vec<Column> = Vec::with_capacity(self.keys.len());
        while self.child.next_chunk(&mut input)? {
            if self.template.column_num() == 0 {
                self.template = input.empty_like();
            }
            if input.is_empty() {
                continue;
            }
            key_columns.clear();
            for key in &self.keys {
                let mut column = Column::new(key.expr.value_type(), key.expr.value_length());
                key.expr
                    .get_column(&input, &mut column)
                    .inspect_err(|e| warn!(error = %e, "failed to evaluate sort key"))?;
                key_columns.push(column);
            }
            for row in 0..input.rows() {
                let values = input.row_values(row).ok_or_else(|| {
                    ExecutorError::Internal(format!("row {} missing from input chunk", row))
                })?;
                let order_by_values = key_columns
                    .iter()
                    .map(|c| {
                        c.get_value(row).cloned().ok_or_else(|| {
                            ExecutorError::Internal(format!("row {} missing from sort key", row))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.rows.push(MaterializedRow {
                    values: Tuple::new(values),
                    order_by_values,
                });
            }
        }
        Ok(())
    }

    fn sort(&mut self) -> Result<(), ExecutorError> {
        if let Some(row) = self
            .rows
            .iter()
            .find(|r| r.order_by_values.len() != self.keys.len())
        {
            return Err(ExecutorError::Internal(format!(
                "materialized row has {} sort values, expected {}",
                row.order_by_values.len(),
                self.keys.len()
            )));
        }
        let keys = &self.keys;
        self.rows
            .sort_by(|a, b| compare_keys(keys, &a.order_by_values, &b.order_by_values));
        Ok(())
    }

    fn check_mode(&self, mode: ExecutionMode) -> Result<(), ExecutorError> {
        if self.mode != mode {
            return Err(ExecutorError::Unimplemented(format!(
                "order by built for {:?} mode cannot run in {:?} mode",
                self.mode, mode
            )));
        }
        Ok(())
    }

    pub(super) fn next(&mut self) -> Result<bool, ExecutorError> {
        self.check_mode(ExecutionMode::Tuple)?;
        if self.cursor >= self.rows.len() {
            self.current = None;
            return Ok(false);
        }
        self.current = Some(self.cursor);
        self.cursor += 1;
        Ok(true)
    }

    pub(super) fn current_tuple(&self) -> Option<&Tuple> {
        self.current
            .and_then(|i| self.rows.get(i))
            .map(|r| &r.values)
    }

    pub(super) fn tuple_schema(&self) -> &[ColumnDesc] {
        self.child.tuple_schema()
    }

    pub(super) fn next_chunk(&mut self, chunk: &mut Chunk) -> Result<bool, ExecutorError> {
        self.check_mode(ExecutionMode::Chunk)?;
        if self.cursor >= self.rows.len() {
            return Ok(false);
        }
        let end = self.rows.len().min(self.cursor + Chunk::MAX_ROWS);
        self.output = self.template.empty_like();
        for row in &self.rows[self.cursor..end] {
            self.output.append_row(row.values.values().to_vec())?;
        }
        self.cursor = end;
        chunk.reference(&self.output);
        Ok(true)
    }

    pub(super) fn close(&mut self) -> Result<(), ExecutorError> {
        self.reset();
        self.child.close()
    }

    fn reset(&mut self) {
        self.rows = Vec::new();
        self.cursor = 0;
        self.current = None;
        self.template.reset();
        self.output.reset();
    }
}
