//! Statement binding.
//!
//! Resolves the table and column names of a [`sql::SelectStmt`] against a
//! [`Db`] and produces a [`BoundSelect`], whose expressions refer to columns by
//! position. Expressions are bound against the scope they run in:
//!
//! - WHERE, GROUP BY and aggregate arguments see the table's columns.
//! - In an aggregate query the select list sees the grouped output: group
//!   values first, then one column per distinct aggregate call.
//! - ORDER BY sees the select list's output. A key naming anything else
//!   moves the sort below the projection, where every key is bound against
//!   the select list's input instead.

use std::sync::Arc;

use crate::catalog::{Db, Table};
use crate::datum::{Type, Value};
use crate::sql::{self, Expr, OrderByItem, SelectItem, SortDirection};

use super::aggregate::{AggregateExpr, AggregateFunction};
use super::error::ExecutorError;
use super::expr::BoundExpr;
use super::operator::OrderByKey;
use super::tuple::ColumnDesc;

/// A SELECT with every name resolved.
#[derive(Debug, Clone)]
pub struct BoundSelect {
    /// Table read by the query.
    pub table: Arc<Table>,
    /// WHERE predicate over the table's columns.
    pub filter: Option<BoundExpr>,
    /// GROUP BY expressions over the table's columns.
    pub group_by: Vec<BoundExpr>,
    /// Distinct aggregate calls, arguments over the table's columns.
    pub aggregates: Vec<AggregateExpr>,
    /// Select list, over the table's columns or, in an aggregate query, over
    /// the grouped output.
    pub query_expressions: Vec<BoundExpr>,
    /// Sort keys, over the select list's output or, when
    /// `sort_before_project` is set, over its input.
    pub order_by: Vec<OrderByKey>,
    /// Whether sorting happens before the select list is evaluated.
    pub sort_before_project: bool,
    /// Row limit; negative means unbounded.
    pub limit: i64,
}

impl BoundSelect {
    /// Whether the query groups or aggregates.
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty() || !self.aggregates.is_empty()
    }

    /// Output column metadata of the select list.
    pub fn output_columns(&self) -> Vec<ColumnDesc> {
        self.query_expressions
            .iter()
            .map(BoundExpr::column_desc)
            .collect()
    }
}

/// Binds `stmt` against the tables of `db`.
pub fn bind_select(db: &Db, stmt: &sql::SelectStmt) -> Result<BoundSelect, ExecutorError> {
    if stmt.columns.is_empty() {
        return Err(ExecutorError::InvalidArgument("empty select list".into()));
    }
    let table = db
        .find_table(&stmt.from)
        .ok_or_else(|| ExecutorError::TableNotFound {
            name: stmt.from.clone(),
        })?;
    let columns: Vec<ColumnDesc> = table
        .fields()
        .iter()
        .map(|f| ColumnDesc {
            name: f.name.clone(),
            table_name: Some(table.name().to_string()),
            ty: f.attr_type,
            len: f.len,
        })
        .collect();
    let scope = TableScope {
        columns: &columns,
        clause: "WHERE",
    };

    let filter = match &stmt.where_clause {
        Some(predicate) => {
            let bound = scope.bind(predicate)?;
            match bound.ty() {
                None | Some(Type::Bool) => Some(bound),
                found => return Err(ExecutorError::type_mismatch(Type::Bool, found)),
            }
        }
        None => None,
    };

    let group_scope = TableScope {
        columns: &columns,
        clause: "GROUP BY",
    };
    let group_by = stmt
        .group_by
        .iter()
        .map(|e| group_scope.bind(e))
        .collect::<Result<Vec<_>, _>>()?;

    let aggregate_query = !stmt.group_by.is_empty() || stmt.columns.iter().any(contains_aggregate);
    let mut outputs: Vec<(Expr, BoundExpr)> = Vec::new();
    let mut aggregates = AggregateScope {
        table: TableScope {
            columns: &columns,
            clause: "aggregate arguments",
        },
        group_exprs: &stmt.group_by,
        group_by: &group_by,
        calls: Vec::new(),
    };

    for item in &stmt.columns {
        match item {
            SelectItem::Wildcard if aggregate_query => {
                return Err(ExecutorError::InvalidArgument(
                    "SELECT * is not allowed in an aggregate query".into(),
                ));
            }
            SelectItem::Wildcard => {
                for (index, desc) in columns.iter().enumerate() {
                    outputs.push((Expr::column(desc.name.clone()), column_ref(index, desc)));
                }
            }
            SelectItem::Expr { expr, alias } => {
                let bound = if aggregate_query {
                    aggregates.bind(expr)?
                } else {
                    scope.bind(expr)?
                };
                let name = alias.clone().unwrap_or_else(|| expr.to_string());
                outputs.push((expr.clone(), BoundExpr::named(name, bound)));
            }
        }
    }

    let (order_by, sort_before_project) =
        match bind_order_keys(&stmt.order_by, |e| bind_order_expr(e, &outputs)) {
            Ok(keys) => (keys, false),
            Err(ExecutorError::ColumnNotFound { .. }) => {
                let order_scope = TableScope {
                    columns: &columns,
                    clause: "ORDER BY",
                };
                let keys = bind_order_keys(&stmt.order_by, |e| {
                    if let Some(index) = output_position(e, &outputs) {
                        return Ok(outputs[index].1.clone());
                    }
                    if aggregate_query {
                        aggregates.bind(e)
                    } else {
                        order_scope.bind(e)
                    }
                })?;
                (keys, true)
            }
            Err(e) => return Err(e),
        };

    let aggregates = aggregates.calls.into_iter().map(|(_, call)| call).collect();
    Ok(BoundSelect {
        table,
        filter,
        group_by,
        aggregates,
        query_expressions: outputs.into_iter().map(|(_, e)| e).collect(),
        order_by,
        sort_before_project,
        limit: stmt.limit.unwrap_or(-1),
    })
}

fn column_ref(index: usize, desc: &ColumnDesc) -> BoundExpr {
    BoundExpr::Column {
        index,
        name: desc.name.clone(),
        table_name: desc.table_name.clone(),
        ty: desc.ty,
        len: desc.len,
    }
}

fn bind_literal(expr: &Expr) -> Option<BoundExpr> {
    let value = match expr {
        Expr::Null => Value::Null,
        Expr::Boolean(b) => Value::Boolean(*b),
        Expr::Integer(n) => match i32::try_from(*n) {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Bigint(*n),
        },
        Expr::Float(f) => Value::Float(*f as f32),
        Expr::String(s) => Value::Chars(s.clone()),
        _ => return None,
    };
    Some(BoundExpr::Literal(value))
}

fn contains_aggregate(item: &SelectItem) -> bool {
    fn walk(expr: &Expr) -> bool {
        match expr {
            Expr::Function { name, args } => {
                AggregateFunction::from_name(name).is_some() || args.iter().any(walk)
            }
            Expr::BinaryOp { left, right, .. } => walk(left) || walk(right),
            _ => false,
        }
    }
    match item {
        SelectItem::Wildcard => false,
        SelectItem::Expr { expr, .. } => walk(expr),
    }
}

fn unknown_function(name: &str) -> ExecutorError {
    ExecutorError::Unimplemented(format!("function {}", name))
}

/// Binds scalar expressions against the columns of the scanned table.
struct TableScope<'a> {
    columns: &'a [ColumnDesc],
    /// Clause being bound, for error messages.
    clause: &'static str,
}

impl TableScope<'_> {
    fn bind(&self, expr: &Expr) -> Result<BoundExpr, ExecutorError> {
        if let Some(literal) = bind_literal(expr) {
            return Ok(literal);
        }
        match expr {
            Expr::ColumnRef { table, column } => self.resolve(table.as_deref(), column),
            Expr::BinaryOp { left, op, right } => {
                BoundExpr::binary(self.bind(left)?, *op, self.bind(right)?)
            }
            Expr::Function { name, .. } if AggregateFunction::from_name(name).is_some() => {
                Err(ExecutorError::InvalidArgument(format!(
                    "aggregate functions are not allowed in {}",
                    self.clause
                )))
            }
            Expr::Function { name, .. } => Err(unknown_function(name)),
            Expr::Star => Err(ExecutorError::InvalidArgument("unexpected *".into())),
            _ => Err(ExecutorError::Internal(format!("unbound literal {}", expr))),
        }
    }

    fn resolve(&self, table: Option<&str>, column: &str) -> Result<BoundExpr, ExecutorError> {
        let found = self.columns.iter().enumerate().find(|(_, c)| {
            c.name.eq_ignore_ascii_case(column)
                && match (table, &c.table_name) {
                    (Some(t), Some(own)) => t.eq_ignore_ascii_case(own),
                    (Some(_), None) => false,
                    (None, _) => true,
                }
        });
        match (found, table) {
            (Some((index, desc)), _) => Ok(column_ref(index, desc)),
            (None, Some(t)) if !self.has_table(t) => Err(ExecutorError::TableNotFound {
                name: t.to_string(),
            }),
            (None, _) => Err(ExecutorError::ColumnNotFound {
                name: column.to_string(),
            }),
        }
    }

    fn has_table(&self, name: &str) -> bool {
        self.columns.iter().any(|c| {
            c.table_name
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(name))
        })
    }
}

/// Binds select items of an aggregate query against the grouped output.
struct AggregateScope<'a> {
    table: TableScope<'a>,
    group_exprs: &'a [Expr],
    group_by: &'a [BoundExpr],
    /// Distinct aggregate calls seen so far, with their source expression.
    calls: Vec<(Expr, AggregateExpr)>,
}

impl AggregateScope<'_> {
    fn bind(&mut self, expr: &Expr) -> Result<BoundExpr, ExecutorError> {
        if let Some(index) = self.group_exprs.iter().position(|g| g.same_as(expr)) {
            let group = &self.group_by[index];
            return Ok(BoundExpr::Column {
                index,
                name: group.name(),
                table_name: None,
                ty: group.value_type(),
                len: group.value_length(),
            });
        }
        if let Some(literal) = bind_literal(expr) {
            return Ok(literal);
        }
        match expr {
            Expr::ColumnRef { column, .. } => Err(ExecutorError::InvalidArgument(format!(
                "column \"{}\" must appear in the GROUP BY clause or be used in an aggregate function",
                column
            ))),
            Expr::BinaryOp { left, op, right } => {
                BoundExpr::binary(self.bind(left)?, *op, self.bind(right)?)
            }
            Expr::Function { name, args } => match AggregateFunction::from_name(name) {
                Some(func) => self.bind_call(expr, func, args),
                None => Err(unknown_function(name)),
            },
            Expr::Star => Err(ExecutorError::InvalidArgument("unexpected *".into())),
            _ => Err(ExecutorError::Internal(format!("unbound literal {}", expr))),
        }
    }

    fn bind_call(
        &mut self,
        expr: &Expr,
        func: AggregateFunction,
        args: &[Expr],
    ) -> Result<BoundExpr, ExecutorError> {
        let position = match self.calls.iter().position(|(e, _)| e.same_as(expr)) {
            Some(position) => position,
            None => {
                let arg = match args {
                    [Expr::Star] if func == AggregateFunction::Count => {
                        BoundExpr::Literal(Value::Int(1))
                    }
                    [arg] => self.table.bind(arg)?,
                    _ => {
                        return Err(ExecutorError::InvalidArgument(format!(
                            "{} takes exactly one argument",
                            func
                        )));
                    }
                };
                let call = AggregateExpr::new(func, arg, expr.to_string())?;
                self.calls.push((expr.clone(), call));
                self.calls.len() - 1
            }
        };
        let call = &self.calls[position].1;
        Ok(BoundExpr::Column {
            index: self.group_by.len() + position,
            name: call.name.clone(),
            table_name: None,
            ty: call.output_type(),
            len: call.output_length(),
        })
    }
}

fn bind_order_keys<F>(items: &[OrderByItem], mut bind: F) -> Result<Vec<OrderByKey>, ExecutorError>
where
    F: FnMut(&Expr) -> Result<BoundExpr, ExecutorError>,
{
    items
        .iter()
        .map(|item| Ok(OrderByKey::new(bind(&item.expr)?, item.direction == SortDirection::Asc)))
        .collect()
}

/// The select item `expr` repeats verbatim, or the output column a column
/// reference names.
fn output_position(expr: &Expr, outputs: &[(Expr, BoundExpr)]) -> Option<usize> {
    outputs
        .iter()
        .position(|(source, _)| source.same_as(expr))
        .or_else(|| match expr {
            Expr::ColumnRef { column, .. } => outputs
                .iter()
                .position(|(_, bound)| bound.name().eq_ignore_ascii_case(column)),
            _ => None,
        })
}

/// Binds an ORDER BY expression against the select list's output.
///
/// A select item repeated verbatim, or a column named like an output column,
/// refers to that output column.
fn bind_order_expr(expr: &Expr, outputs: &[(Expr, BoundExpr)]) -> Result<BoundExpr, ExecutorError> {
    if let Some(index) = output_position(expr, outputs) {
        return Ok(column_ref(index, &outputs[index].1.column_desc()));
    }
    if let Some(literal) = bind_literal(expr) {
        return Ok(literal);
    }
    match expr {
        Expr::ColumnRef { column, .. } => Err(ExecutorError::ColumnNotFound {
            name: column.clone(),
        }),
        Expr::BinaryOp { left, op, right } => BoundExpr::binary(
            bind_order_expr(left, outputs)?,
            *op,
            bind_order_expr(right, outputs)?,
        ),
        other => Err(ExecutorError::ColumnNotFound {
            name: other.to_string(),
        }),
    }
}
