//! Property tests for the blocking and limiting operators, run in both modes.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use tributary::config::ExecutionMode;
use tributary::datum::{Type, Value};
use tributary::executor::operator::{GroupBy, Limit, OrderBy, Values};
use tributary::executor::{
    AggregateExpr, AggregateFunction, BoundExpr, ColumnDesc, OrderByKey, PhysicalOperator, collect_rows,
};
use tributary::tx::{TransactionManager, Trx};

const MODES: [ExecutionMode; 2] = [ExecutionMode::Tuple, ExecutionMode::Chunk];

fn column(index: usize, name: &str) -> BoundExpr {
    BoundExpr::Column {
        index,
        name: name.to_string(),
        table_name: None,
        ty: Type::Int,
        len: 4,
    }
}

/// `(k, v)` rows split into batches of `batch` rows.
fn source(rows: &[(i32, i32)], batch: usize) -> PhysicalOperator {
    let batches: Vec<Vec<Vec<Value>>> = rows
        .chunks(batch.max(1))
        .map(|b| {
            b.iter()
                .map(|&(k, v)| vec![Value::Int(k), Value::Int(v)])
                .collect::<Vec<_>>()
        })
        .collect();
    PhysicalOperator::Values(Values::new(
        vec![
            ColumnDesc::computed("k", Type::Int, 4),
            ColumnDesc::computed("v", Type::Int, 4),
        ],
        batches,
    ))
}

fn run(mut root: PhysicalOperator, mode: ExecutionMode) -> Vec<Vec<Value>> {
    let trx = Trx::new(Arc::new(TransactionManager::new()));
    collect_rows(&mut root, &trx, mode)
        .unwrap()
        .into_iter()
        .map(|t| t.into_values())
        .collect()
}

fn int(value: &Value) -> i64 {
    value.get_bigint().unwrap()
}

fn rows_strategy() -> impl Strategy<Value = Vec<(i32, i32)>> {
    prop::collection::vec((0..5i32, -100..100i32), 0..60)
}

proptest! {
    #[test]
    fn prop_limit_bounds_output(rows in rows_strategy(), limit in -3i64..80, batch in 1usize..8) {
        for mode in MODES {
            let out = run(PhysicalOperator::Limit(Limit::new(source(&rows, batch), limit)), mode);
            let expected = if limit < 0 { rows.len() } else { rows.len().min(limit as usize) };
            prop_assert_eq!(out.len(), expected);
            for (got, &(k, v)) in out.iter().zip(&rows) {
                prop_assert_eq!(got, &vec![Value::Int(k), Value::Int(v)]);
            }
        }
    }

    #[test]
    fn prop_order_by_sorts(rows in rows_strategy(), batch in 1usize..8, ascending in any::<bool>()) {
        for mode in MODES {
            let keys = vec![OrderByKey::new(column(1, "v"), ascending)];
            let out = run(
                PhysicalOperator::OrderBy(OrderBy::new(source(&rows, batch), keys, mode)),
                mode,
            );
            prop_assert_eq!(out.len(), rows.len());
            for pair in out.windows(2) {
                let (a, b) = (int(&pair[0][1]), int(&pair[1][1]));
                let in_order = if ascending { a <= b } else { a >= b };
                prop_assert!(in_order, "{} then {} (ascending: {})", a, b, ascending);
            }

            let mut expected: Vec<i32> = rows.iter().map(|&(_, v)| v).collect();
            let mut got: Vec<i32> = out.iter().map(|r| int(&r[1]) as i32).collect();
            expected.sort_unstable();
            got.sort_unstable();
            prop_assert_eq!(got, expected);
        }
    }

    #[test]
    fn prop_group_by_matches_naive(rows in rows_strategy(), batch in 1usize..8) {
        let mut expected: HashMap<i32, (i64, i64)> = HashMap::new();
        for &(k, v) in &rows {
            let entry = expected.entry(k).or_default();
            entry.0 += 1;
            entry.1 += v as i64;
        }

        for mode in MODES {
            let aggregates = vec![
                AggregateExpr::new(AggregateFunction::Count, column(1, "v"), "COUNT(v)").unwrap(),
                AggregateExpr::new(AggregateFunction::Sum, column(1, "v"), "SUM(v)").unwrap(),
            ];
            let out = run(
                PhysicalOperator::GroupBy(GroupBy::new(
                    source(&rows, batch),
                    vec![column(0, "k")],
                    aggregates,
                    mode,
                )),
                mode,
            );
            prop_assert_eq!(out.len(), expected.len());
            let mut seen = HashMap::new();
            for row in &out {
                let k = int(&row[0]) as i32;
                prop_assert!(seen.insert(k, (int(&row[1]), int(&row[2]))).is_none());
            }
            prop_assert_eq!(&seen, &expected);
        }
    }
}
