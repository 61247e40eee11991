//! Hash table backing GROUP BY.
//!
//! [`AggregateHashTable`] maps each distinct group key to one running state per
//! aggregate. Once the build phase is over the table is consumed by an
//! [`AggregateHashTableScanner`], which emits one output row per group.
//!
//! Iteration order over groups is not part of the contract. Callers needing a
//! deterministic order must sort the scanner's output.

use std::collections::HashMap;
use std::collections::hash_map::IntoIter;

use crate::chunk::Chunk;
use crate::datum::{Type, Value};

use super::aggregate::{AggregateFunction, AggregateState, GroupKey, aggregate_output_type};
use super::error::ExecutorError;

type GroupState = Vec<AggregateState>;

/// Group key → running aggregate state.
pub struct AggregateHashTable {
    group_width: usize,
    aggregates: Vec<(AggregateFunction, Type)>,
    groups: HashMap<GroupKey, GroupState>,
}

impl AggregateHashTable {
    /// Creates an empty table for keys of `group_width` values and the given
    /// aggregates, each paired with its input type.
    pub fn new(group_width: usize, aggregates: Vec<(AggregateFunction, Type)>) -> Self {
        Self {
            group_width,
            aggregates,
            groups: HashMap::new(),
        }
    }

    /// Number of distinct groups seen so far.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Types of the finalized aggregate columns.
    pub fn output_types(&self) -> Vec<Type> {
        self.aggregates
            .iter()
            .map(|(func, ty)| aggregate_output_type(*func, *ty))
            .collect()
    }

    /// Folds one input row into its group.
    ///
    /// NULL aggregate inputs are skipped. A row with the wrong number of
    /// group or aggregate values is an internal error.
    pub fn add_row(&mut self, group: Vec<Value>, inputs: &[Value]) -> Result<(), ExecutorError> {
        if group.len() != self.group_width {
            return Err(ExecutorError::Internal(format!(
                "group key has {} values, expected {}",
                group.len(),
                self.group_width
            )));
        }
        if inputs.len() != self.aggregates.len() {
            return Err(ExecutorError::Internal(format!(
                "aggregate input has {} values, expected {}",
                inputs.len(),
                self.aggregates.len()
            )));
        }
        let aggregates = &self.aggregates;
        let states = self
            .groups
            .entry(GroupKey(group))
            .or_insert_with(|| new_group_state(aggregates));
        for (state, value) in states.iter_mut().zip(inputs) {
            if !value.is_null() {
                state.update(value)?;
            }
        }
        Ok(())
    }

    /// Folds every row of a batch into the table.
    ///
    /// `groups` holds one column per group expression and `aggrs` one column
    /// per aggregate input; both describe the same rows. With no group
    /// expressions `groups` may have no columns at all.
    pub fn add_chunk(&mut self, groups: &Chunk, aggrs: &Chunk) -> Result<(), ExecutorError> {
        if groups.column_num() != self.group_width || aggrs.column_num() != self.aggregates.len() {
            return Err(ExecutorError::Internal(format!(
                "batch has {} group and {} aggregate columns, expected {} and {}",
                groups.column_num(),
                aggrs.column_num(),
                self.group_width,
                self.aggregates.len()
            )));
        }
        let rows = if groups.column_num() > 0 {
            groups.rows()
        } else {
            aggrs.rows()
        };
        if groups.columns().chain(aggrs.columns()).any(|c| c.len() != rows) {
            return Err(ExecutorError::Internal(
                "group and aggregate columns differ in row count".into(),
            ));
        }

        let mut inputs = Vec::with_capacity(aggrs.column_num());
        for row in 0..rows {
            let group: Vec<Value> = groups
                .columns()
                .map(|c| c.values()[row].clone())
                .collect();
            inputs.clear();
            inputs.extend(aggrs.columns().map(|c| c.values()[row].clone()));
            self.add_row(group, &inputs)?;
        }
        Ok(())
    }

    /// Consumes the table, returning a scanner over its groups.
    ///
    /// Without group expressions there is exactly one implicit group, which
    /// exists even when no input row was added.
    pub fn scan(mut self) -> AggregateHashTableScanner {
        if self.group_width == 0 && self.groups.is_empty() {
            let states = new_group_state(&self.aggregates);
            self.groups.insert(GroupKey(Vec::new()), states);
        }
        AggregateHashTableScanner {
            output_types: self.output_types(),
            group_width: self.group_width,
            remaining: self.groups.len(),
            entries: self.groups.into_iter(),
        }
    }
}

fn new_group_state(aggregates: &[(AggregateFunction, Type)]) -> GroupState {
    aggregates
        .iter()
        .map(|(func, _)| AggregateState::new(*func))
        .collect()
}

/// Drains an [`AggregateHashTable`], one finalized group at a time.
pub struct AggregateHashTableScanner {
    output_types: Vec<Type>,
    group_width: usize,
    remaining: usize,
    entries: IntoIter<GroupKey, GroupState>,
}

impl AggregateHashTableScanner {
    /// Groups not yet returned.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Returns the next group as key values followed by aggregate results.
    pub fn next_row(&mut self) -> Option<Vec<Value>> {
        let (GroupKey(mut row), states) = self.entries.next()?;
        self.remaining -= 1;
        row.extend(states.iter().map(AggregateState::finalize));
        Some(row)
    }

    /// Fills `chunk` with up to [`Chunk::MAX_ROWS`] groups.
    ///
    /// `chunk` must have one column per group value followed by one per
    /// aggregate; aggregate columns are retyped to their finalized types.
    /// Returns `Ok(false)` once every group has been returned.
    pub fn next_chunk(&mut self, chunk: &mut Chunk) -> Result<bool, ExecutorError> {
        let expected = self.group_width + self.output_types.len();
        if chunk.column_num() != expected {
            return Err(ExecutorError::Internal(format!(
                "output chunk has {} columns, expected {}",
                chunk.column_num(),
                expected
            )));
        }
        if self.remaining == 0 {
            return Ok(false);
        }

        chunk.reset_data();
        for (i, ty) in self.output_types.iter().enumerate() {
            if let Some(column) = chunk.column_mut(self.group_width + i)
                && column.attr_type() != *ty
            {
                column.set_attr_type(*ty, ty.default_length());
            }
        }
        while chunk.rows() < Chunk::MAX_ROWS {
            let Some(row) = self.next_row() else {
                break;
            };
            chunk.append_row(row)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Column;

    fn sum_count_table() -> AggregateHashTable {
        AggregateHashTable::new(
            1,
            vec![
                (AggregateFunction::Sum, Type::Int),
                (AggregateFunction::Count, Type::Int),
            ],
        )
    }

    fn drain_rows(mut scanner: AggregateHashTableScanner) -> Vec<Vec<Value>> {
        let mut rows = Vec::new();
        while let Some(row) = scanner.next_row() {
            rows.push(row);
        }
        rows.sort_by(|a, b| a[0].compare(&b[0]));
        rows
    }

    #[test]
    fn test_add_row_groups_by_key() {
        let mut table = sum_count_table();
        let eng = || vec![Value::Chars("eng".into())];
        table.add_row(eng(), &[Value::Int(10), Value::Int(10)]).unwrap();
        table.add_row(eng(), &[Value::Int(20), Value::Int(20)]).unwrap();
        table
            .add_row(vec![Value::Chars("sales".into())], &[Value::Int(5), Value::Null])
            .unwrap();
        assert_eq!(table.len(), 2);

        let rows = drain_rows(table.scan());
        assert_eq!(
            rows,
            vec![
                vec![Value::Chars("eng".into()), Value::Bigint(30), Value::Bigint(2)],
                vec![Value::Chars("sales".into()), Value::Bigint(5), Value::Bigint(0)],
            ]
        );
    }

    #[test]
    fn test_signed_zero_keys_share_a_group() {
        let mut table = sum_count_table();
        for key in [0.0, -0.0, 0.0] {
            table
                .add_row(vec![Value::Float(key)], &[Value::Int(1), Value::Int(1)])
                .unwrap();
        }
        assert_eq!(table.len(), 1);
        let rows = drain_rows(table.scan());
        assert_eq!(rows[0][1..], [Value::Bigint(3), Value::Bigint(3)]);
    }

    #[test]
    fn test_add_row_width_mismatch() {
        let mut table = sum_count_table();
        let err = table.add_row(vec![], &[Value::Int(1), Value::Int(1)]).unwrap_err();
        assert!(matches!(err, ExecutorError::Internal(_)));
        let err = table.add_row(vec![Value::Int(1)], &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, ExecutorError::Internal(_)));
    }

    #[test]
    fn test_add_chunk() {
        let mut groups = Chunk::new();
        groups.add_column(
            Column::from_values(Type::Int, 4, [1, 2, 1].map(Value::Int)).unwrap(),
            0,
        );
        let mut aggrs = Chunk::new();
        aggrs.add_column(
            Column::from_values(Type::Int, 4, [3, 4, 5].map(Value::Int)).unwrap(),
            1,
        );
        aggrs.add_column(
            Column::from_values(Type::Int, 4, [3, 4, 5].map(Value::Int)).unwrap(),
            2,
        );
        let mut table = sum_count_table();
        table.add_chunk(&groups, &aggrs).unwrap();

        let rows = drain_rows(table.scan());
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::Bigint(8), Value::Bigint(2)],
                vec![Value::Int(2), Value::Bigint(4), Value::Bigint(1)],
            ]
        );
    }

    #[test]
    fn test_add_chunk_rejects_ragged_columns() {
        let mut groups = Chunk::new();
        groups.add_column(Column::from_values(Type::Int, 4, [Value::Int(1)]).unwrap(), 0);
        let mut aggrs = Chunk::new();
        aggrs.add_column(Column::new(Type::Int, 4), 1);
        aggrs.add_column(Column::new(Type::Int, 4), 2);
        let err = sum_count_table().add_chunk(&groups, &aggrs).unwrap_err();
        assert!(matches!(err, ExecutorError::Internal(_)));
    }

    #[test]
    fn test_scan_implicit_group() {
        let table = AggregateHashTable::new(
            0,
            vec![
                (AggregateFunction::Count, Type::Int),
                (AggregateFunction::Max, Type::Int),
            ],
        );
        let mut scanner = table.scan();
        assert_eq!(scanner.remaining(), 1);
        assert_eq!(scanner.next_row(), Some(vec![Value::Bigint(0), Value::Null]));
        assert_eq!(scanner.next_row(), None);
    }

    #[test]
    fn test_scanner_next_chunk_retypes_aggregates() {
        let mut table = sum_count_table();
        for i in 0..3 {
            table.add_row(vec![Value::Int(i)], &[Value::Int(i), Value::Int(i)]).unwrap();
        }
        let mut scanner = table.scan();

        let mut out = Chunk::new();
        out.add_column(Column::new(Type::Int, 4), 0);
        out.add_column(Column::new(Type::Int, 4), 1);
        out.add_column(Column::new(Type::Int, 4), 2);
        assert!(scanner.next_chunk(&mut out).unwrap());
        assert_eq!(out.rows(), 3);
        assert_eq!(out.column(1).map(Column::attr_type), Some(Type::Bigint));
        assert_eq!(out.column(2).map(Column::attr_type), Some(Type::Bigint));
        assert!(!scanner.next_chunk(&mut out).unwrap());
    }

    #[test]
    fn test_scanner_splits_batches() {
        let mut table = AggregateHashTable::new(1, vec![]);
        let groups = Chunk::MAX_ROWS as i64 + 10;
        for i in 0..groups {
            table.add_row(vec![Value::Bigint(i)], &[]).unwrap();
        }
        let mut scanner = table.scan();
        let mut out = Chunk::new();
        out.add_column(Column::new(Type::Bigint, 8), 0);

        let mut sizes = Vec::new();
        while scanner.next_chunk(&mut out).unwrap() {
            sizes.push(out.rows());
        }
        assert_eq!(sizes, vec![Chunk::MAX_ROWS, 10]);
    }
}
