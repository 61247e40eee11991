//! Logical query plans and their lowering into operator trees.
//!
//! - [`QueryPlan`] describes *what* a bound SELECT computes, without state.
//! - [`Optimizer`] turns a [`BoundSelect`] into an executable
//!   [`PhysicalOperator`] tree for one [`ExecutionMode`].
//! - [`LocalOptimizer`] is the built-in optimizer: it applies a few local
//!   rewrites to the plan and lowers each node to its operator.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::Table;
use crate::config::ExecutionMode;
use crate::datum::Value;

use super::aggregate::AggregateExpr;
use super::binder::BoundSelect;
use super::error::ExecutorError;
use super::expr::BoundExpr;
use super::operator::{Filter, GroupBy, Limit, OrderBy, OrderByKey, PhysicalOperator, Project, TableScan};

/// A logical query plan node.
#[derive(Debug, Clone)]
pub enum QueryPlan {
    /// Scan of a stored table.
    TableScan { table: Arc<Table> },
    /// WHERE clause.
    Filter {
        input: Box<QueryPlan>,
        predicate: BoundExpr,
    },
    /// GROUP BY and aggregate calls.
    GroupBy {
        input: Box<QueryPlan>,
        group_by: Vec<BoundExpr>,
        aggregates: Vec<AggregateExpr>,
    },
    /// Select list.
    Project {
        input: Box<QueryPlan>,
        exprs: Vec<BoundExpr>,
    },
    /// ORDER BY clause.
    OrderBy {
        input: Box<QueryPlan>,
        keys: Vec<OrderByKey>,
    },
    /// LIMIT clause; negative means unbounded.
    Limit { input: Box<QueryPlan>, limit: i64 },
}

impl QueryPlan {
    /// Builds the canonical plan of a bound SELECT:
    /// scan → filter → group by → project → order by → limit, with the
    /// sort placed under the projection when its keys need the input.
    pub fn from_select(select: &BoundSelect) -> Self {
        let mut plan = QueryPlan::TableScan {
            table: Arc::clone(&select.table),
        };
        if let Some(predicate) = &select.filter {
            plan = QueryPlan::Filter {
                input: Box::new(plan),
                predicate: predicate.clone(),
            };
        }
        if select.is_aggregate() {
            plan = QueryPlan::GroupBy {
                input: Box::new(plan),
                group_by: select.group_by.clone(),
                aggregates: select.aggregates.clone(),
            };
        }
        let sort = |plan: QueryPlan| {
            if select.order_by.is_empty() {
                plan
            } else {
                QueryPlan::OrderBy {
                    input: Box::new(plan),
                    keys: select.order_by.clone(),
                }
            }
        };
        if select.sort_before_project {
            plan = sort(plan);
        }
        plan = QueryPlan::Project {
            input: Box::new(plan),
            exprs: select.query_expressions.clone(),
        };
        if !select.sort_before_project {
            plan = sort(plan);
        }
        QueryPlan::Limit {
            input: Box::new(plan),
            limit: select.limit,
        }
    }

    /// Formats this plan as a human-readable EXPLAIN string.
    ///
    /// # Example output
    ///
    /// ```text
    /// Limit: 2
    ///   Project: id, dept
    ///     TableScan: t
    /// ```
    pub fn explain(&self) -> String {
        self.format(0)
    }

    fn format(&self, indent: usize) -> String {
        let prefix = "  ".repeat(indent);
        let join = |items: Vec<String>| items.join(", ");
        let (line, input) = match self {
            QueryPlan::TableScan { table } => (format!("TableScan: {}", table.name()), None),
            QueryPlan::Filter { input, predicate } => (format!("Filter: {}", predicate), Some(input)),
            QueryPlan::GroupBy {
                input,
                group_by,
                aggregates,
            } => (
                format!(
                    "GroupBy: keys [{}] aggregates [{}]",
                    join(group_by.iter().map(ToString::to_string).collect()),
                    join(aggregates.iter().map(ToString::to_string).collect())
                ),
                Some(input),
            ),
            QueryPlan::Project { input, exprs } => (
                format!("Project: {}", join(exprs.iter().map(ToString::to_string).collect())),
                Some(input),
            ),
            QueryPlan::OrderBy { input, keys } => (
                format!("OrderBy: {}", join(keys.iter().map(ToString::to_string).collect())),
                Some(input),
            ),
            QueryPlan::Limit { input, limit } => (format!("Limit: {}", limit), Some(input)),
        };
        match input {
            Some(input) => format!("{}{}\n{}", prefix, line, input.format(indent + 1)),
            None => format!("{}{}", prefix, line),
        }
    }
}

/// Turns a bound SELECT into an executable operator tree.
pub trait Optimizer {
    /// Produces an operator tree able to run in `mode`.
    fn optimize(&self, select: &BoundSelect, mode: ExecutionMode) -> Result<PhysicalOperator, ExecutorError>;
}

/// Rule-based optimizer applying local rewrites only.
///
/// Rewrites:
/// - a filter whose predicate is the constant TRUE is removed;
/// - an unbounded LIMIT is removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOptimizer;

impl LocalOptimizer {
    /// Applies the rewrite rules bottom-up.
    pub fn rewrite(&self, plan: QueryPlan) -> QueryPlan {
        match plan {
            QueryPlan::TableScan { .. } => plan,
            QueryPlan::Filter { input, predicate } => {
                let input = self.rewrite(*input);
                if matches!(predicate, BoundExpr::Literal(Value::Boolean(true))) {
                    input
                } else {
                    QueryPlan::Filter {
                        input: Box::new(input),
                        predicate,
                    }
                }
            }
            QueryPlan::GroupBy {
                input,
                group_by,
                aggregates,
            } => QueryPlan::GroupBy {
                input: Box::new(self.rewrite(*input)),
                group_by,
                aggregates,
            },
            QueryPlan::Project { input, exprs } => QueryPlan::Project {
                input: Box::new(self.rewrite(*input)),
                exprs,
            },
            QueryPlan::OrderBy { input, keys } => QueryPlan::OrderBy {
                input: Box::new(self.rewrite(*input)),
                keys,
            },
            QueryPlan::Limit { input, limit } if limit < 0 => self.rewrite(*input),
            QueryPlan::Limit { input, limit } => QueryPlan::Limit {
                input: Box::new(self.rewrite(*input)),
                limit,
            },
        }
    }

    /// Lowers each plan node to its operator.
    pub fn lower(&self, plan: QueryPlan, mode: ExecutionMode) -> PhysicalOperator {
        match plan {
            QueryPlan::TableScan { table } => PhysicalOperator::TableScan(TableScan::new(table)),
            QueryPlan::Filter { input, predicate } => {
                PhysicalOperator::Filter(Filter::new(self.lower(*input, mode), predicate))
            }
            QueryPlan::GroupBy {
                input,
                group_by,
                aggregates,
            } => PhysicalOperator::GroupBy(GroupBy::new(
                self.lower(*input, mode),
                group_by,
                aggregates,
                mode,
            )),
            QueryPlan::Project { input, exprs } => {
                PhysicalOperator::Project(Project::new(self.lower(*input, mode), exprs))
            }
            QueryPlan::OrderBy { input, keys } => {
                PhysicalOperator::OrderBy(OrderBy::new(self.lower(*input, mode), keys, mode))
            }
            QueryPlan::Limit { input, limit } => {
                PhysicalOperator::Limit(Limit::new(self.lower(*input, mode), limit))
            }
        }
    }
}

impl Optimizer for LocalOptimizer {
    fn optimize(&self, select: &BoundSelect, mode: ExecutionMode) -> Result<PhysicalOperator, ExecutorError> {
        let plan = self.rewrite(QueryPlan::from_select(select));
        let root = self.lower(plan, mode);
        if !root.supports(mode) {
            return Err(ExecutorError::Internal(format!(
                "optimized plan cannot run in {:?} mode",
                mode
            )));
        }
        debug!(mode = ?mode, plan = %root.explain(), "optimized query");
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttrInfo, Db, StorageFormat};
    use crate::datum::Type;
    use crate::executor::binder::bind_select;
    use crate::sql::{BinaryOperator, Expr, SelectStmt};

    fn setup() -> Db {
        let db = Db::new("test");
        db.create_table(
            "t",
            &[
                AttrInfo::new("id", Type::Int, 4),
                AttrInfo::new("dept", Type::Chars, 8),
                AttrInfo::new("amount", Type::Int, 4),
            ],
            &[],
            StorageFormat::Row,
        )
        .unwrap();
        db
    }

    #[test]
    fn test_logical_plan_shape() {
        let db = setup();
        let stmt = SelectStmt::from_table("t")
            .column(Expr::column("dept"))
            .column(Expr::function("SUM", vec![Expr::column("amount")]))
            .filter(Expr::binary(Expr::column("id"), BinaryOperator::Gt, Expr::Integer(0)))
            .group_by(Expr::column("dept"))
            .order_by(Expr::column("dept"), true);
        let plan = QueryPlan::from_select(&bind_select(&db, &stmt).unwrap());
        assert_eq!(
            plan.explain(),
            "Limit: -1\n\
             \x20 OrderBy: dept ASC\n\
             \x20   Project: dept, SUM(amount)\n\
             \x20     GroupBy: keys [dept] aggregates [SUM(amount)]\n\
             \x20       Filter: (id > 0)\n\
             \x20         TableScan: t"
        );
    }

    #[test]
    fn test_sort_below_projection() {
        let db = setup();
        let stmt = SelectStmt::from_table("t")
            .column(Expr::column("id"))
            .order_by(Expr::column("amount"), false)
            .limit(2);
        let plan = QueryPlan::from_select(&bind_select(&db, &stmt).unwrap());
        assert_eq!(
            plan.explain(),
            "Limit: 2\n  Project: id\n    OrderBy: amount DESC\n      TableScan: t"
        );
    }

    #[test]
    fn test_rewrite_drops_trivial_nodes() {
        let db = setup();
        let stmt = SelectStmt::from_table("t")
            .wildcard()
            .filter(Expr::Boolean(true));
        let plan = LocalOptimizer.rewrite(QueryPlan::from_select(&bind_select(&db, &stmt).unwrap()));
        assert_eq!(plan.explain(), "Project: id, dept, amount\n  TableScan: t");
    }

    #[test]
    fn test_optimize_builds_for_mode() {
        let db = setup();
        let stmt = SelectStmt::from_table("t")
            .wildcard()
            .order_by(Expr::column("amount"), false)
            .limit(2);
        let select = bind_select(&db, &stmt).unwrap();
        for mode in [ExecutionMode::Tuple, ExecutionMode::Chunk] {
            let root = LocalOptimizer.optimize(&select, mode).unwrap();
            assert!(root.supports(mode));
            assert_eq!(root.name(), "Limit");
        }
        let chunked = LocalOptimizer.optimize(&select, ExecutionMode::Chunk).unwrap();
        assert!(!chunked.supports(ExecutionMode::Tuple));
        assert_eq!(
            chunked.explain(),
            "Limit: 2\n  OrderBy: amount DESC\n    Project: id, dept, amount\n      TableScan: t (id, dept, amount)"
        );
    }
}
