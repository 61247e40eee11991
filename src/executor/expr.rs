//! Bound expression tree with compile-time column resolution.
//!
//! [`BoundExpr`] is the executor's representation of SQL expressions. Column
//! references are resolved to positional indices at bind time, so evaluation
//! is O(1) per reference in both protocols:
//!
//! - [`BoundExpr::get_value`] evaluates against one [`Tuple`] (row mode)
//! - [`BoundExpr::get_column`] evaluates against a whole [`Chunk`] (chunk mode)

use std::cmp::Ordering;
use std::fmt;

use crate::chunk::{Chunk, Column};
use crate::datum::{Type, Value};
use crate::sql::BinaryOperator;

use super::error::ExecutorError;
use super::tuple::{ColumnDesc, Tuple};

/// An expression tree with column references resolved to positional indices.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    /// Column reference resolved to a positional index.
    Column {
        /// Positional index into the input row/chunk.
        index: usize,
        /// Column name for display purposes.
        name: String,
        /// Source table, for columns read straight from a table.
        table_name: Option<String>,
        /// Type of the referenced column.
        ty: Type,
        /// Byte length of the referenced column; 0 if unknown.
        len: usize,
    },
    /// Constant.
    Literal(Value),
    /// Binary operation.
    BinaryOp {
        left: Box<BoundExpr>,
        op: BinaryOperator,
        right: Box<BoundExpr>,
    },
    /// Renamed expression (`expr AS name`).
    Alias { name: String, expr: Box<BoundExpr> },
}

impl BoundExpr {
    /// Builds a binary operation, checking operand types.
    pub fn binary(left: BoundExpr, op: BinaryOperator, right: BoundExpr) -> Result<Self, ExecutorError> {
        let (lt, rt) = (left.ty(), right.ty());
        if op.is_arithmetic() {
            for ty in [lt, rt].into_iter().flatten() {
                if !ty.is_numeric() {
                    return Err(ExecutorError::type_mismatch("numeric", Some(ty)));
                }
            }
        } else if op.is_comparison() {
            if let (Some(l), Some(r)) = (lt, rt)
                && !comparable(l, r)
            {
                return Err(ExecutorError::type_mismatch(l, Some(r)));
            }
        } else {
            for ty in [lt, rt].into_iter().flatten() {
                if ty != Type::Bool {
                    return Err(ExecutorError::type_mismatch(Type::Bool, Some(ty)));
                }
            }
        }
        Ok(BoundExpr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    /// Wraps `expr` so that it reports `name`, unless it already does.
    pub fn named(name: impl Into<String>, expr: BoundExpr) -> Self {
        let name = name.into();
        match expr {
            BoundExpr::Column { name: ref n, .. } if *n == name => expr,
            BoundExpr::Alias { expr, .. } => BoundExpr::Alias { name, expr },
            expr => BoundExpr::Alias {
                name,
                expr: Box::new(expr),
            },
        }
    }

    /// Returns the static output type, or `None` for an untyped NULL.
    pub fn ty(&self) -> Option<Type> {
        match self {
            BoundExpr::Column { ty, .. } => Some(*ty),
            BoundExpr::Literal(value) => value.attr_type(),
            BoundExpr::BinaryOp { left, op, right } => {
                if op.is_arithmetic() {
                    arithmetic_type(left.ty(), right.ty())
                } else {
                    Some(Type::Bool)
                }
            }
            BoundExpr::Alias { expr, .. } => expr.ty(),
        }
    }

    /// Output type; an untyped NULL reports [`Type::Chars`].
    pub fn value_type(&self) -> Type {
        self.ty().unwrap_or(Type::Chars)
    }

    /// Byte length when statically known, otherwise 0.
    pub fn value_length(&self) -> usize {
        match self {
            BoundExpr::Column { len, .. } => *len,
            BoundExpr::Literal(value) => value.length(),
            BoundExpr::BinaryOp { .. } => 0,
            BoundExpr::Alias { expr, .. } => expr.value_length(),
        }
    }

    /// Output column name.
    pub fn name(&self) -> String {
        match self {
            BoundExpr::Column { name, .. } | BoundExpr::Alias { name, .. } => name.clone(),
            _ => self.to_string(),
        }
    }

    /// Output column metadata.
    pub fn column_desc(&self) -> ColumnDesc {
        let table_name = match self {
            BoundExpr::Column { table_name, .. } => table_name.clone(),
            _ => None,
        };
        ColumnDesc {
            name: self.name(),
            table_name,
            ty: self.value_type(),
            len: self.value_length(),
        }
    }

    /// Evaluates the expression against one row.
    pub fn get_value(&self, tuple: &Tuple) -> Result<Value, ExecutorError> {
        self.eval_row(tuple.values())
    }

    /// Evaluates the expression against a row given as a value slice.
    pub fn eval_row(&self, row: &[Value]) -> Result<Value, ExecutorError> {
        match self {
            BoundExpr::Column { index, .. } => row.get(*index).cloned().ok_or_else(|| {
                ExecutorError::Internal(format!(
                    "column index {} out of bounds for row with {} columns",
                    index,
                    row.len()
                ))
            }),
            BoundExpr::Literal(value) => Ok(value.clone()),
            BoundExpr::BinaryOp { left, op, right } => {
                eval_binary(*op, &left.eval_row(row)?, &right.eval_row(row)?)
            }
            BoundExpr::Alias { expr, .. } => expr.eval_row(row),
        }
    }

    /// Evaluates the expression over every row of `chunk` into `out`.
    ///
    /// `out` is replaced by a column of [`value_type`](Self::value_type)
    /// holding one value per input row.
    pub fn get_column(&self, chunk: &Chunk, out: &mut Column) -> Result<(), ExecutorError> {
        let len = match self.value_length() {
            0 => self.value_type().default_length(),
            n => n,
        };
        if let BoundExpr::Column { index, .. } = self.unalias() {
            let source = chunk.column(*index).ok_or_else(|| {
                ExecutorError::Internal(format!(
                    "column index {} out of bounds for chunk with {} columns",
                    index,
                    chunk.column_num()
                ))
            })?;
            if source.attr_type() == self.value_type() {
                *out = source.clone();
                return Ok(());
            }
        }
        let values = self.eval_column(chunk)?;
        *out = Column::from_values(self.value_type(), len, values)?;
        Ok(())
    }

    fn eval_column(&self, chunk: &Chunk) -> Result<Vec<Value>, ExecutorError> {
        match self {
            BoundExpr::Column { index, .. } => chunk
                .column(*index)
                .map(|c| c.values().to_vec())
                .ok_or_else(|| {
                    ExecutorError::Internal(format!(
                        "column index {} out of bounds for chunk with {} columns",
                        index,
                        chunk.column_num()
                    ))
                }),
            BoundExpr::Literal(value) => Ok(vec![value.clone(); chunk.rows()]),
            BoundExpr::BinaryOp { left, op, right } => {
                let lhs = left.eval_column(chunk)?;
                let rhs = right.eval_column(chunk)?;
                lhs.iter()
                    .zip(&rhs)
                    .map(|(l, r)| eval_binary(*op, l, r))
                    .collect()
            }
            BoundExpr::Alias { expr, .. } => expr.eval_column(chunk),
        }
    }

    fn unalias(&self) -> &BoundExpr {
        match self {
            BoundExpr::Alias { expr, .. } => expr.unalias(),
            other => other,
        }
    }
}

impl fmt::Display for BoundExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundExpr::Column { name, .. } => write!(f, "{}", name),
            BoundExpr::Literal(Value::Chars(s) | Value::Text(s)) => write!(f, "'{}'", s),
            BoundExpr::Literal(value) => write!(f, "{}", value),
            BoundExpr::BinaryOp { left, op, right } => {
                write!(f, "({} {} {})", left, op.as_str(), right)
            }
            BoundExpr::Alias { name, expr } => write!(f, "{} AS {}", expr, name),
        }
    }
}

/// Whether values of the two types can be compared.
fn comparable(l: Type, r: Type) -> bool {
    l == r
        || (l.is_numeric() && r.is_numeric())
        || (l.is_string() && r.is_string())
        || (l == Type::Date && r.is_string())
        || (l.is_string() && r == Type::Date)
}

/// Result type of an arithmetic operation.
fn arithmetic_type(l: Option<Type>, r: Option<Type>) -> Option<Type> {
    match (l, r) {
        (None, other) | (other, None) => other,
        (Some(Type::Float), _) | (_, Some(Type::Float)) => Some(Type::Float),
        (Some(Type::Int), Some(Type::Int)) => Some(Type::Int),
        _ => Some(Type::Bigint),
    }
}

/// Evaluates `l op r` with SQL NULL semantics.
fn eval_binary(op: BinaryOperator, l: &Value, r: &Value) -> Result<Value, ExecutorError> {
    match op {
        BinaryOperator::And | BinaryOperator::Or => return eval_logical(op, l, r),
        _ if l.is_null() || r.is_null() => return Ok(Value::Null),
        _ => {}
    }
    if op.is_comparison() {
        let ord = compare_for_predicate(l, r)?;
        let result = match op {
            BinaryOperator::Eq => ord == Ordering::Equal,
            BinaryOperator::Neq => ord != Ordering::Equal,
            BinaryOperator::Lt => ord == Ordering::Less,
            BinaryOperator::LtEq => ord != Ordering::Greater,
            BinaryOperator::Gt => ord == Ordering::Greater,
            _ => ord != Ordering::Less,
        };
        return Ok(Value::Boolean(result));
    }
    eval_arithmetic(op, l, r)
}

fn compare_for_predicate(l: &Value, r: &Value) -> Result<Ordering, ExecutorError> {
    match (l, r) {
        (Value::Date(_), Value::Chars(_) | Value::Text(_)) => {
            Ok(l.compare(&r.cast_to(Type::Date)?))
        }
        (Value::Chars(_) | Value::Text(_), Value::Date(_)) => {
            Ok(l.cast_to(Type::Date)?.compare(r))
        }
        _ => match (l.attr_type(), r.attr_type()) {
            (Some(lt), Some(rt)) if !comparable(lt, rt) => {
                Err(ExecutorError::type_mismatch(lt, Some(rt)))
            }
            _ => Ok(l.compare(r)),
        },
    }
}

/// Three-valued AND/OR.
fn eval_logical(op: BinaryOperator, l: &Value, r: &Value) -> Result<Value, ExecutorError> {
    let as_bool = |v: &Value| -> Result<Option<bool>, ExecutorError> {
        match v {
            Value::Null => Ok(None),
            Value::Boolean(b) => Ok(Some(*b)),
            other => Err(ExecutorError::type_mismatch(Type::Bool, other.attr_type())),
        }
    };
    let (l, r) = (as_bool(l)?, as_bool(r)?);
    // The dominant value decides regardless of NULL: false for AND, true for OR.
    let dominant = op == BinaryOperator::Or;
    let result = if l == Some(dominant) || r == Some(dominant) {
        Some(dominant)
    } else if l.is_none() || r.is_none() {
        None
    } else {
        Some(!dominant)
    };
    Ok(result.map_or(Value::Null, Value::Boolean))
}

fn eval_arithmetic(op: BinaryOperator, l: &Value, r: &Value) -> Result<Value, ExecutorError> {
    if let (Value::Int(a), Value::Int(b)) = (l, r) {
        let result = match op {
            BinaryOperator::Add => a.checked_add(*b),
            BinaryOperator::Sub => a.checked_sub(*b),
            BinaryOperator::Mul => a.checked_mul(*b),
            _ if *b == 0 => return Err(ExecutorError::DivisionByZero),
            _ => a.checked_div(*b),
        };
        return result.map(Value::Int).ok_or(ExecutorError::IntegerOverflow);
    }
    if let (Some(a), Some(b)) = (l.get_bigint(), r.get_bigint()) {
        let result = match op {
            BinaryOperator::Add => a.checked_add(b),
            BinaryOperator::Sub => a.checked_sub(b),
            BinaryOperator::Mul => a.checked_mul(b),
            _ if b == 0 => return Err(ExecutorError::DivisionByZero),
            _ => a.checked_div(b),
        };
        return result.map(Value::Bigint).ok_or(ExecutorError::IntegerOverflow);
    }
    let (Some(a), Some(b)) = (l.get_double(), r.get_double()) else {
        let bad = if l.get_double().is_none() { l } else { r };
        return Err(ExecutorError::type_mismatch("numeric", bad.attr_type()));
    };
    let result = match op {
        BinaryOperator::Add => a + b,
        BinaryOperator::Sub => a - b,
        BinaryOperator::Mul => a * b,
        _ if b == 0.0 => return Err(ExecutorError::DivisionByZero),
        _ => a / b,
    };
    Ok(Value::Float(result as f32))
}
