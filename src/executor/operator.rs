//! Physical operators implementing the Volcano pull model.
//!
//! Every operator follows the same protocol:
//!
//! - [`open`](PhysicalOperator::open) prepares state and opens the child
//!   under the caller's transaction.
//! - Row mode: [`next`](PhysicalOperator::next) advances, then
//!   [`current_tuple`](PhysicalOperator::current_tuple) exposes the row until
//!   the following call.
//! - Chunk mode: [`next_chunk`](PhysicalOperator::next_chunk) fills a
//!   caller-supplied [`Chunk`] with up to [`Chunk::MAX_ROWS`] rows. A child may
//!   hand back an empty chunk; consumers skip it.
//! - Both report end of stream as `Ok(false)`.
//! - [`close`](PhysicalOperator::close) releases state and closes the child.
//!   It is safe after a failed `open` and after a previous `close`.
//!
//! Operators are unary. The set of kinds is closed and dispatched through one
//! enum, so adding an operator means touching this file.

mod filter;
mod group_by;
mod limit;
mod order_by;
mod project;
mod scan;
mod values;

use std::fmt;

use crate::chunk::Chunk;
use crate::config::ExecutionMode;
use crate::tx::Transaction;

use super::error::ExecutorError;
use super::tuple::{ColumnDesc, Tuple};

pub use filter::Filter;
pub use group_by::GroupBy;
pub use limit::Limit;
pub use order_by::{OrderBy, OrderByKey};
pub use project::Project;
pub use scan::TableScan;
pub use values::Values;

/// Protocol facets an operator implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorCaps {
    /// `next()` + `current_tuple()` are implemented.
    pub tuple_mode: bool,
    /// `next_chunk()` is implemented.
    pub chunk_mode: bool,
    /// The operator consumes its whole input before producing output.
    pub blocking: bool,
}

impl OperatorCaps {
    /// Streaming operator supporting both protocols.
    pub const STREAMING: OperatorCaps = OperatorCaps {
        tuple_mode: true,
        chunk_mode: true,
        blocking: false,
    };

    /// Materializing operator built for one protocol.
    pub const fn blocking(mode: ExecutionMode) -> Self {
        OperatorCaps {
            tuple_mode: matches!(mode, ExecutionMode::Tuple),
            chunk_mode: matches!(mode, ExecutionMode::Chunk),
            blocking: true,
        }
    }

    pub fn supports(&self, mode: ExecutionMode) -> bool {
        match mode {
            ExecutionMode::Tuple => self.tuple_mode,
            ExecutionMode::Chunk => self.chunk_mode,
        }
    }
}

/// A node of an executable operator tree.
pub enum PhysicalOperator {
    /// Reads the rows of a stored table visible to the transaction.
    TableScan(TableScan),
    /// Emits in-memory rows.
    Values(Values),
    /// Drops rows whose predicate is not true (WHERE).
    Filter(Filter),
    /// Evaluates the select list.
    Project(Project),
    /// Stops after a fixed number of rows.
    Limit(Limit),
    /// Materializes and sorts its input.
    OrderBy(OrderBy),
    /// Hash aggregation.
    GroupBy(GroupBy),
}

impl PhysicalOperator {
    /// Operator kind, as shown by [`explain`](Self::explain).
    pub fn name(&self) -> &'static str {
        match self {
            PhysicalOperator::TableScan(_) => "TableScan",
            PhysicalOperator::Values(_) => "Values",
            PhysicalOperator::Filter(_) => "Filter",
            PhysicalOperator::Project(_) => "Project",
            PhysicalOperator::Limit(_) => "Limit",
            PhysicalOperator::OrderBy(_) => "OrderBy",
            PhysicalOperator::GroupBy(_) => "GroupBy",
        }
    }

    pub fn capabilities(&self) -> OperatorCaps {
        match self {
            PhysicalOperator::TableScan(_)
            | PhysicalOperator::Values(_)
            | PhysicalOperator::Filter(_)
            | PhysicalOperator::Project(_)
            | PhysicalOperator::Limit(_) => OperatorCaps::STREAMING,
            PhysicalOperator::OrderBy(n) => OperatorCaps::blocking(n.mode()),
            PhysicalOperator::GroupBy(n) => OperatorCaps::blocking(n.mode()),
        }
    }

    /// Child operators, in order. Empty for leaves.
    pub fn children(&self) -> &[PhysicalOperator] {
        match self {
            PhysicalOperator::TableScan(_) | PhysicalOperator::Values(_) => &[],
            PhysicalOperator::Filter(n) => std::slice::from_ref(n.child()),
            PhysicalOperator::Project(n) => std::slice::from_ref(n.child()),
            PhysicalOperator::Limit(n) => std::slice::from_ref(n.child()),
            PhysicalOperator::OrderBy(n) => std::slice::from_ref(n.child()),
            PhysicalOperator::GroupBy(n) => std::slice::from_ref(n.child()),
        }
    }

    /// Returns true if this operator and every descendant implement `mode`.
    pub fn supports(&self, mode: ExecutionMode) -> bool {
        self.capabilities().supports(mode) && self.children().iter().all(|c| c.supports(mode))
    }

    pub fn open(&mut self, trx: &dyn Transaction) -> Result<(), ExecutorError> {
        match self {
            PhysicalOperator::TableScan(n) => n.open(trx),
            PhysicalOperator::Values(n) => n.open(trx),
            PhysicalOperator::Filter(n) => n.open(trx),
            PhysicalOperator::Project(n) => n.open(trx),
            PhysicalOperator::Limit(n) => n.open(trx),
            PhysicalOperator::OrderBy(n) => n.open(trx),
            PhysicalOperator::GroupBy(n) => n.open(trx),
        }
    }

    /// Advances to the next row. Returns `Ok(false)` at end of stream.
    ///
    /// This follows the Volcano naming convention, not `std::iter::Iterator`.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<bool, ExecutorError> {
        match self {
            PhysicalOperator::TableScan(n) => n.next(),
            PhysicalOperator::Values(n) => n.next(),
            PhysicalOperator::Filter(n) => n.next(),
            PhysicalOperator::Project(n) => n.next(),
            PhysicalOperator::Limit(n) => n.next(),
            PhysicalOperator::OrderBy(n) => n.next(),
            PhysicalOperator::GroupBy(n) => n.next(),
        }
    }

    /// Row produced by the last successful [`next`](Self::next).
    pub fn current_tuple(&self) -> Option<&Tuple> {
        match self {
            PhysicalOperator::TableScan(n) => n.current_tuple(),
            PhysicalOperator::Values(n) => n.current_tuple(),
            PhysicalOperator::Filter(n) => n.current_tuple(),
            PhysicalOperator::Project(n) => n.current_tuple(),
            PhysicalOperator::Limit(n) => n.current_tuple(),
            PhysicalOperator::OrderBy(n) => n.current_tuple(),
            PhysicalOperator::GroupBy(n) => n.current_tuple(),
        }
    }

    /// Output column metadata.
    pub fn tuple_schema(&self) -> &[ColumnDesc] {
        match self {
            PhysicalOperator::TableScan(n) => n.tuple_schema(),
            PhysicalOperator::Values(n) => n.tuple_schema(),
            PhysicalOperator::Filter(n) => n.tuple_schema(),
            PhysicalOperator::Project(n) => n.tuple_schema(),
            PhysicalOperator::Limit(n) => n.tuple_schema(),
            PhysicalOperator::OrderBy(n) => n.tuple_schema(),
            PhysicalOperator::GroupBy(n) => n.tuple_schema(),
        }
    }

    /// Fills `chunk` with the next batch. Returns `Ok(false)` at end of stream.
    ///
    /// The batch may share column buffers with the operator's internal state
    /// and is valid until the next call.
    pub fn next_chunk(&mut self, chunk: &mut Chunk) -> Result<bool, ExecutorError> {
        match self {
            PhysicalOperator::TableScan(n) => n.next_chunk(chunk),
            PhysicalOperator::Values(n) => n.next_chunk(chunk),
            PhysicalOperator::Filter(n) => n.next_chunk(chunk),
            PhysicalOperator::Project(n) => n.next_chunk(chunk),
            PhysicalOperator::Limit(n) => n.next_chunk(chunk),
            PhysicalOperator::OrderBy(n) => n.next_chunk(chunk),
            PhysicalOperator::GroupBy(n) => n.next_chunk(chunk),
        }
    }

    pub fn close(&mut self) -> Result<(), ExecutorError> {
        match self {
            PhysicalOperator::TableScan(n) => n.close(),
            PhysicalOperator::Values(n) => n.close(),
            PhysicalOperator::Filter(n) => n.close(),
            PhysicalOperator::Project(n) => n.close(),
            PhysicalOperator::Limit(n) => n.close(),
            PhysicalOperator::OrderBy(n) => n.close(),
            PhysicalOperator::GroupBy(n) => n.close(),
        }
    }

    /// Renders the operator tree, one node per line, children indented.
    ///
    /// # Example output
    ///
    /// ```text
    /// Limit: 2
    ///   OrderBy: amount DESC
    ///     TableScan: t (id, dept, amount)
    /// ```
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.format_tree(0, &mut out);
        out
    }

    fn format_tree(&self, indent: usize, out: &mut String) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&"  ".repeat(indent));
        out.push_str(&self.to_string());
        for child in self.children() {
            child.format_tree(indent + 1, out);
        }
    }
}

impl fmt::Display for PhysicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.name())?;
        match self {
            PhysicalOperator::TableScan(n) => {
                let names: Vec<&str> = n.tuple_schema().iter().map(|c| c.name.as_str()).collect();
                write!(f, "{} ({})", n.table_name(), names.join(", "))
            }
            PhysicalOperator::Values(n) => write!(f, "{} rows", n.row_count()),
            PhysicalOperator::Filter(n) => write!(f, "{}", n.predicate()),
            PhysicalOperator::Project(n) => write!(f, "{}", join(n.expressions())),
            PhysicalOperator::Limit(n) => write!(f, "{}", n.limit()),
            PhysicalOperator::OrderBy(n) => write!(f, "{}", join(n.keys())),
            PhysicalOperator::GroupBy(n) => {
                write!(f, "keys [{}] aggregates [{}]", join(n.group_by()), join(n.aggregates()))
            }
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
