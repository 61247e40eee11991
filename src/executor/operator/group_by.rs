use tracing::{debug, warn};

use crate::chunk::{Chunk, Column};
use crate::config::ExecutionMode;
use crate::tx::Transaction;

use super::super::aggregate::AggregateExpr;
use super::super::error::ExecutorError;
use super::super::expr::BoundExpr;
use super::super::hash_table::{AggregateHashTable, AggregateHashTableScanner};
use super::super::tuple::{ColumnDesc, Tuple};
use super::PhysicalOperator;

enum GroupByState {
    Unopened,
    /// Draining the child into the hash table.
    Building,
    Scanning(AggregateHashTableScanner),
    Closed,
}

/// Hash aggregation.
///
/// `open` drains the child into an [`AggregateHashTable`]; the operator then
/// emits one row per group, group values first, then aggregate results.
/// Without group expressions all input forms one group, which is emitted
/// even for empty input. Group order is unspecified.
pub struct GroupBy {
    child: Box<PhysicalOperator>,
    group_by: Vec<BoundExpr>,
    aggregates: Vec<AggregateExpr>,
    mode: ExecutionMode,
    schema: Vec<ColumnDesc>,
    state: GroupByState,
    output: Chunk,
    current: Option<Tuple>,
}

impl GroupBy {
    pub fn new(
        child: PhysicalOperator,
        group_by: Vec<BoundExpr>,
        aggregates: Vec<AggregateExpr>,
        mode: ExecutionMode,
    ) -> Self {
        let schema = group_by
            .iter()
            .map(BoundExpr::column_desc)
            .chain(aggregates.iter().map(AggregateExpr::column_desc))
            .collect();
        Self {
            child: Box::new(child),
            group_by,
            aggregates,
            mode,
            schema,
            state: GroupByState::Unopened,
            output: Chunk::new(),
            current: None,
        }
    }

    pub fn child(&self) -> &PhysicalOperator {
        &self.child
    }

    pub fn group_by(&self) -> &[BoundExpr] {
        &self.group_by
    }

    pub fn aggregates(&self) -> &[AggregateExpr] {
        &self.aggregates
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub(super) fn open(&mut self, trx: &dyn Transaction) -> Result<(), ExecutorError> {
        self.state = GroupByState::Building;
        self.current = None;
        self.child.open(trx).inspect_err(|e| {
            warn!(error = %e, operator = "GroupBy", "failed to open child operator");
        })?;

        let mut table = AggregateHashTable::new(
            self.group_by.len(),
            self.aggregates
                .iter()
                .map(|a| (a.func, a.input_type()))
                .collect(),
        );
        match self.mode {
            ExecutionMode::Tuple => self.build_from_rows(&mut table)?,
            ExecutionMode::Chunk => {
                self.output = self.output_template();
                self.build_from_chunks(&mut table)?;
            }
        }
        debug!(groups = table.len(), "group by hash table built");
        self.state = GroupByState::Scanning(table.scan());
        Ok(())
    }

    /// Group columns followed by one column per aggregate input.
    fn output_template(&self) -> Chunk {
        let mut chunk = Chunk::new();
        let inputs = self
            .group_by
            .iter()
            .chain(self.aggregates.iter().map(|a| &a.arg));
        for (id, expr) in inputs.enumerate() {
            chunk.add_column(new_column(expr), id);
        }
        chunk
    }

    fn build_from_rows(&mut self, table: &mut AggregateHashTable) -> Result<(), ExecutorError> {
        let mut inputs = Vec::with_capacity(self.aggregates.len());
        while self.child.next()? {
            let tuple = self.child.current_tuple().ok_or_else(|| {
                ExecutorError::Internal("child returned a row but exposes no tuple".into())
            })?;
            let group = self
                .group_by
                .iter()
                .map(|e| e.get_value(tuple))
                .collect::<Result<Vec<_>, _>>()?;
            inputs.clear();
            for aggregate in &self.aggregates {
                inputs.push(aggregate.arg.get_value(tuple)?);
            }
            table.add_row(group, &inputs)?;
        }
        Ok(())
    }

    fn build_from_chunks(&mut self, table: &mut AggregateHashTable) -> Result<(), ExecutorError> {
        let mut input = Chunk::new();
        while self.child.next_chunk(&mut input)? {
            if input.is_empty() {
                continue;
            }
            let groups = evaluate(&self.group_by, &input)?;
            let args: Vec<&BoundExpr> = self.aggregates.iter().map(|a| &a.arg).collect();
            let aggrs = evaluate(args, &input)?;
            table.add_chunk(&groups, &aggrs)?;
        }
        Ok(())
    }

    fn check_mode(&self, mode: ExecutionMode) -> Result<(), ExecutorError> {
        if self.mode != mode {
            return Err(ExecutorError::Unimplemented(format!(
                "group by built for {:?} mode cannot run in {:?} mode",
                self.mode, mode
            )));
        }
        Ok(())
    }

    fn scanner(&mut self) -> Result<&mut AggregateHashTableScanner, ExecutorError> {
        match &mut self.state {
            GroupByState::Scanning(scanner) => Ok(scanner),
            _ => Err(ExecutorError::Internal("group by is not open".into())),
        }
    }

    pub(super) fn next(&mut self) -> Result<bool, ExecutorError> {
        self.check_mode(ExecutionMode::Tuple)?;
        self.current = self.scanner()?.next_row().map(Tuple::new);
        Ok(self.current.is_some())
    }

    pub(super) fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    pub(super) fn tuple_schema(&self) -> &[ColumnDesc] {
        &self.schema
    }

    pub(super) fn next_chunk(&mut self, chunk: &mut Chunk) -> Result<bool, ExecutorError> {
        self.check_mode(ExecutionMode::Chunk)?;
        let GroupByState::Scanning(scanner) = &mut self.state else {
            return Err(ExecutorError::Internal("group by is not open".into()));
        };
        if !scanner.next_chunk(&mut self.output)? {
            return Ok(false);
        }
        chunk.reference(&self.output);
        Ok(true)
    }

    pub(super) fn close(&mut self) -> Result<(), ExecutorError> {
        if let GroupByState::Scanning(scanner) = &self.state {
            debug!(unreturned_groups = scanner.remaining(), "closing group by");
        }
        self.state = GroupByState::Closed;
        self.output.reset();
        self.current = None;
        self.child.close()
    }
}

fn new_column(expr: &BoundExpr) -> Column {
    let len = match expr.value_length() {
        0 => expr.value_type().default_length(),
        n => n,
    };
    Column::new(expr.value_type(), len)
}

/// Evaluates each expression over `input` into a new chunk, one column each.
fn evaluate<'a>(
    exprs: impl IntoIterator<Item = &'a BoundExpr>,
    input: &Chunk,
) -> Result<Chunk, ExecutorError> {
    let mut out = Chunk::new();
    for (id, expr) in exprs.into_iter().enumerate() {
        let mut column = new_column(expr);
        expr.get_column(input, &mut column)
            .inspect_err(|e| warn!(error = %e, expr = %expr, "failed to evaluate group by input"))?;
        out.add_column(column, id);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{Type, Value};
    use crate::executor::aggregate::AggregateFunction;
    use crate::executor::operator::Values;
    use crate::executor::operator::test_util::{drain_chunks, drain_rows, int_column, values_operator};
    use crate::tx::{TransactionManager, Trx};
    use std::sync::Arc;

    fn sales() -> PhysicalOperator {
        let row = |dept: &str, amount: i32| vec![Value::Chars(dept.into()), Value::Int(amount)];
        PhysicalOperator::Values(Values::new(
            vec![
                ColumnDesc::computed("dept", Type::Chars, 8),
                ColumnDesc::computed("amount", Type::Int, 4),
            ],
            vec![
                vec![row("eng", 10), row("sales", 5)],
                vec![],
                vec![row("eng", 20)],
            ],
        ))
    }

    fn dept() -> BoundExpr {
        BoundExpr::Column {
            index: 0,
            name: "dept".into(),
            table_name: None,
            ty: Type::Chars,
            len: 8,
        }
    }

    fn aggregate(func: AggregateFunction, name: &str) -> AggregateExpr {
        AggregateExpr::new(func, int_column(1, "amount"), name).unwrap()
    }

    fn sorted(mut rows: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
        rows.sort_by(|a, b| a[0].compare(&b[0]));
        rows
    }

    fn run(mode: ExecutionMode, child: PhysicalOperator, group_by: Vec<BoundExpr>) -> Vec<Vec<Value>> {
        let trx = Trx::new(Arc::new(TransactionManager::new()));
        let aggregates = vec![
            aggregate(AggregateFunction::Sum, "SUM(amount)"),
            aggregate(AggregateFunction::Count, "COUNT(amount)"),
        ];
        let mut op = PhysicalOperator::GroupBy(GroupBy::new(child, group_by, aggregates, mode));
        op.open(&trx).unwrap();
        let rows = match mode {
            ExecutionMode::Tuple => drain_rows(&mut op),
            ExecutionMode::Chunk => drain_chunks(&mut op),
        };
        op.close().unwrap();
        rows
    }

    #[test]
    fn test_group_by_both_modes() {
        let expected = vec![
            vec![Value::Chars("eng".into()), Value::Bigint(30), Value::Bigint(2)],
            vec![Value::Chars("sales".into()), Value::Bigint(5), Value::Bigint(1)],
        ];
        for mode in [ExecutionMode::Tuple, ExecutionMode::Chunk] {
            assert_eq!(sorted(run(mode, sales(), vec![dept()])), expected, "{:?}", mode);
        }
    }

    #[test]
    fn test_no_keys_single_group() {
        for mode in [ExecutionMode::Tuple, ExecutionMode::Chunk] {
            assert_eq!(
                run(mode, sales(), vec![]),
                vec![vec![Value::Bigint(35), Value::Bigint(3)]]
            );
        }
    }

    #[test]
    fn test_no_keys_empty_input() {
        let empty = || values_operator(&[]);
        for mode in [ExecutionMode::Tuple, ExecutionMode::Chunk] {
            let trx = Trx::new(Arc::new(TransactionManager::new()));
            let count = AggregateExpr::new(
                AggregateFunction::Count,
                BoundExpr::Literal(Value::Int(1)),
                "COUNT(*)",
            )
            .unwrap();
            let mut op = PhysicalOperator::GroupBy(GroupBy::new(empty(), vec![], vec![count], mode));
            op.open(&trx).unwrap();
            let rows = match mode {
                ExecutionMode::Tuple => drain_rows(&mut op),
                ExecutionMode::Chunk => drain_chunks(&mut op),
            };
            assert_eq!(rows, vec![vec![Value::Bigint(0)]]);
        }
    }

    #[test]
    fn test_schema_uses_output_types() {
        let op = GroupBy::new(
            sales(),
            vec![dept()],
            vec![aggregate(AggregateFunction::Avg, "AVG(amount)")],
            ExecutionMode::Chunk,
        );
        let types: Vec<Type> = op.tuple_schema().iter().map(|c| c.ty).collect();
        assert_eq!(types, vec![Type::Chars, Type::Float]);
        assert_eq!(op.tuple_schema()[1].name, "AVG(amount)");
    }

    #[test]
    fn test_next_before_open_is_internal() {
        let mut op = GroupBy::new(sales(), vec![dept()], vec![], ExecutionMode::Tuple);
        assert!(matches!(op.next(), Err(ExecutorError::Internal(_))));
        op.close().unwrap();
        op.close().unwrap();
    }
}
