//! Query executor implementing the Volcano iterator model.
//!
//! A SELECT is bound against a database, turned into a logical plan and
//! lowered into a tree of physical operators which the caller pulls from,
//! either a row at a time or in column batches ([`crate::chunk::Chunk`]).
//!
//! # Architecture
//!
//! ```text
//! AST (SelectStmt)
//!       |
//! [bind_select] -- resolves names, types and aggregates
//!       |
//! BoundSelect
//!       |
//! [Optimizer] -- QueryPlan rewrites, lowering for one ExecutionMode
//!       |
//! PhysicalOperator tree:
//!   Limit
//!     └── OrderBy
//!           └── Project
//!                 └── GroupBy
//!                       └── Filter
//!                             └── TableScan
//! ```
//!
//! # Components
//!
//! - [`bind_select`]: Resolves a SELECT AST into a [`BoundSelect`]
//! - [`LocalOptimizer`]: Builds the operator tree for a bound SELECT
//! - [`PhysicalOperator`]: Enum-dispatched operators with both pull protocols
//! - [`AggregateHashTable`]: Grouped aggregation state shared by both modes
//! - [`collect_rows`] / [`drain`]: Drive an operator tree to completion
//! - [`CreateMaterializedViewExecutor`]: CREATE MATERIALIZED VIEW

mod aggregate;
mod binder;
mod error;
mod expr;
mod hash_table;
mod materialized_view;
pub mod operator;
mod plan;
mod runner;
mod tuple;

pub use aggregate::{AggregateExpr, AggregateFunction, AggregateState, GroupKey, aggregate_output_type};
pub use binder::{BoundSelect, bind_select};
pub use error::ExecutorError;
pub use expr::BoundExpr;
pub use hash_table::{AggregateHashTable, AggregateHashTableScanner};
pub use materialized_view::{CreateMaterializedViewExecutor, infer_view_schema, sanitize_column_name};
pub use operator::{OperatorCaps, OrderByKey, PhysicalOperator};
pub use plan::{LocalOptimizer, Optimizer, QueryPlan};
pub use runner::{Output, check_mode, collect_rows, drain};
pub use tuple::{ColumnDesc, Tuple};
