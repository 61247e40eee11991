//! Aggregate calls and their per-group running state.
//!
//! - [`AggregateFunction`]: COUNT, SUM, AVG, MIN, MAX
//! - [`AggregateExpr`]: one aggregate call in a select list
//! - [`AggregateState`]: running state of one aggregate over one group
//! - [`GroupKey`]: hash map key where NULL groups with NULL

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::datum::{Type, Value};

use super::error::ExecutorError;
use super::expr::BoundExpr;
use super::tuple::ColumnDesc;

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// Number of non-NULL inputs; `COUNT(*)` counts every row.
    Count,
    Sum,
    /// Always produces a Float.
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    /// Resolves a function name (case-insensitive) to an aggregate function.
    ///
    /// Returns `None` for non-aggregate function names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(AggregateFunction::Count),
            "sum" => Some(AggregateFunction::Sum),
            "avg" => Some(AggregateFunction::Avg),
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            _ => None,
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "COUNT"),
            AggregateFunction::Sum => write!(f, "SUM"),
            AggregateFunction::Avg => write!(f, "AVG"),
            AggregateFunction::Min => write!(f, "MIN"),
            AggregateFunction::Max => write!(f, "MAX"),
        }
    }
}

/// Computes the output type for an aggregate function given its input type.
///
/// - COUNT → Bigint
/// - SUM: Int/Bigint input → Bigint, Float input → Float
/// - AVG → always Float (regardless of input type)
/// - MIN/MAX → same as input type
pub fn aggregate_output_type(func: AggregateFunction, input_ty: Type) -> Type {
    match func {
        AggregateFunction::Count => Type::Bigint,
        AggregateFunction::Sum if input_ty == Type::Float => Type::Float,
        AggregateFunction::Sum => Type::Bigint,
        AggregateFunction::Avg => Type::Float,
        AggregateFunction::Min | AggregateFunction::Max => input_ty,
    }
}

/// A single aggregate call within a GROUP BY.
///
/// COUNT(\*) is represented as `func: Count` with a non-NULL literal
/// argument, so every row is counted.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    /// Aggregate function to apply.
    pub func: AggregateFunction,
    /// Argument, evaluated per input row before accumulation.
    pub arg: BoundExpr,
    /// Display name, e.g. `SUM(amount)`.
    pub name: String,
}

impl AggregateExpr {
    /// Creates an aggregate call, checking that the argument type suits the function.
    pub fn new(func: AggregateFunction, arg: BoundExpr, name: impl Into<String>) -> Result<Self, ExecutorError> {
        if matches!(func, AggregateFunction::Sum | AggregateFunction::Avg)
            && let Some(ty) = arg.ty()
            && !ty.is_numeric()
        {
            return Err(ExecutorError::type_mismatch("numeric", Some(ty)));
        }
        Ok(Self {
            func,
            arg,
            name: name.into(),
        })
    }

    /// Type of the pre-aggregation argument.
    pub fn input_type(&self) -> Type {
        self.arg.value_type()
    }

    /// Returns the output type of this aggregate.
    pub fn output_type(&self) -> Type {
        aggregate_output_type(self.func, self.input_type())
    }

    /// Output byte length: MIN/MAX keep the argument's, others are unknown (0).
    pub fn output_length(&self) -> usize {
        match self.func {
            AggregateFunction::Min | AggregateFunction::Max => self.arg.value_length(),
            _ => 0,
        }
    }

    /// Output column metadata.
    pub fn column_desc(&self) -> ColumnDesc {
        ColumnDesc::computed(self.name.clone(), self.output_type(), self.output_length())
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Running state of one aggregate over one group.
///
/// Only non-NULL inputs reach [`update`](Self::update); the hash table skips
/// NULLs before folding.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateState {
    /// Number of inputs seen.
    Count(i64),
    /// Exact integer sum; `None` until the first input.
    IntSum(Option<i64>),
    /// Sum after the first float input.
    FloatSum(f64),
    /// Sum and count of the inputs.
    Avg { sum: f64, count: i64 },
    /// Smallest input so far, NULL if none.
    Min(Value),
    /// Largest input so far, NULL if none.
    Max(Value),
}

impl AggregateState {
    pub fn new(func: AggregateFunction) -> Self {
        match func {
            AggregateFunction::Count => AggregateState::Count(0),
            AggregateFunction::Sum => AggregateState::IntSum(None),
            AggregateFunction::Avg => AggregateState::Avg { sum: 0.0, count: 0 },
            AggregateFunction::Min => AggregateState::Min(Value::Null),
            AggregateFunction::Max => AggregateState::Max(Value::Null),
        }
    }

    /// Folds a non-NULL input into the state.
    ///
    /// Integer sums use checked arithmetic and switch to floating point once
    /// a float input arrives.
    pub fn update(&mut self, value: &Value) -> Result<(), ExecutorError> {
        let not_numeric = || ExecutorError::type_mismatch("numeric", value.attr_type());
        match self {
            AggregateState::Count(n) => *n += 1,
            AggregateState::IntSum(sum) => match value.get_bigint() {
                Some(v) => {
                    let total = sum.unwrap_or(0).checked_add(v);
                    *sum = Some(total.ok_or(ExecutorError::IntegerOverflow)?);
                }
                None => {
                    let v = value.get_double().ok_or_else(not_numeric)?;
                    *self = AggregateState::FloatSum(sum.unwrap_or(0) as f64 + v);
                }
            },
            AggregateState::FloatSum(sum) => *sum += value.get_double().ok_or_else(not_numeric)?,
            AggregateState::Avg { sum, count } => {
                *sum += value.get_double().ok_or_else(not_numeric)?;
                *count += 1;
            }
            AggregateState::Min(current) => {
                if current.is_null() || value.compare(current) == Ordering::Less {
                    *current = value.clone();
                }
            }
            AggregateState::Max(current) => {
                if current.is_null() || value.compare(current) == Ordering::Greater {
                    *current = value.clone();
                }
            }
        }
        Ok(())
    }

    /// Final aggregate value. Everything but COUNT is NULL over no input.
    pub fn finalize(&self) -> Value {
        match self {
            AggregateState::Count(n) => Value::Bigint(*n),
            AggregateState::IntSum(sum) => sum.map_or(Value::Null, Value::Bigint),
            AggregateState::FloatSum(sum) => Value::Float(*sum as f32),
            AggregateState::Avg { count: 0, .. } => Value::Null,
            AggregateState::Avg { sum, count } => Value::Float((*sum / *count as f64) as f32),
            AggregateState::Min(v) | AggregateState::Max(v) => v.clone(),
        }
    }
}

/// HashMap key for GROUP BY grouping.
///
/// Wraps a `Vec<Value>` with SQL GROUP BY equality semantics:
/// - NULL = NULL (NULLs form one group)
/// - NaN = NaN (for float grouping)
/// - `Int(1)` = `Bigint(1)` and `Chars("a")` = `Text("a")`
///
/// Equality is element-wise [`Value::compare`]; hashing uses
/// [`Value::hash_into`], which agrees with it.
#[derive(Debug, Clone)]
pub struct GroupKey(pub Vec<Value>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a.compare(b) == Ordering::Equal)
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for val in &self.0 {
            val.hash_into(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_key(key: &GroupKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn column(ty: Type) -> BoundExpr {
        BoundExpr::Column {
            index: 0,
            name: "c".into(),
            table_name: None,
            ty,
            len: 10,
        }
    }

    fn fold(func: AggregateFunction, inputs: &[Value]) -> Result<Value, ExecutorError> {
        let mut state = AggregateState::new(func);
        for v in inputs {
            state.update(v)?;
        }
        Ok(state.finalize())
    }

    // ========================================================================
    // AggregateState
    // ========================================================================

    #[test]
    fn test_count() {
        let inputs = [Value::Int(1), Value::Chars("x".into()), Value::Boolean(true)];
        assert_eq!(fold(AggregateFunction::Count, &inputs).unwrap(), Value::Bigint(3));
        assert_eq!(fold(AggregateFunction::Count, &[]).unwrap(), Value::Bigint(0));
    }

    #[test]
    fn test_sum_widens_integers() {
        let inputs = [Value::Int(10), Value::Bigint(20), Value::Int(30)];
        assert_eq!(fold(AggregateFunction::Sum, &inputs).unwrap(), Value::Bigint(60));
        assert!(fold(AggregateFunction::Sum, &[]).unwrap().is_null());
    }

    #[test]
    fn test_sum_switches_to_float() {
        let inputs = [Value::Int(10), Value::Float(2.5), Value::Int(1)];
        assert_eq!(fold(AggregateFunction::Sum, &inputs).unwrap(), Value::Float(13.5));
        let floats = [Value::Float(1.5), Value::Float(2.5)];
        assert_eq!(fold(AggregateFunction::Sum, &floats).unwrap(), Value::Float(4.0));
    }

    #[test]
    fn test_sum_errors() {
        let overflow = fold(AggregateFunction::Sum, &[Value::Bigint(i64::MAX), Value::Int(1)]);
        assert!(matches!(overflow, Err(ExecutorError::IntegerOverflow)));
        let text = fold(AggregateFunction::Sum, &[Value::Chars("x".into())]);
        assert!(matches!(text, Err(ExecutorError::TypeMismatch { .. })));
    }

    #[test]
    fn test_avg() {
        let inputs = [Value::Int(1), Value::Int(2)];
        assert_eq!(fold(AggregateFunction::Avg, &inputs).unwrap(), Value::Float(1.5));
        assert!(fold(AggregateFunction::Avg, &[]).unwrap().is_null());
    }

    #[test]
    fn test_min_max() {
        let words = ["banana", "apple", "cherry"].map(|w| Value::Chars(w.into()));
        assert_eq!(fold(AggregateFunction::Min, &words).unwrap(), Value::Chars("apple".into()));
        assert_eq!(fold(AggregateFunction::Max, &words).unwrap(), Value::Chars("cherry".into()));

        let dates = [Value::Date(20200101), Value::Date(20230101), Value::Date(20210101)];
        assert_eq!(fold(AggregateFunction::Max, &dates).unwrap(), Value::Date(20230101));
        assert!(fold(AggregateFunction::Min, &[]).unwrap().is_null());
    }

    // ========================================================================
    // AggregateExpr
    // ========================================================================

    #[test]
    fn test_output_types() {
        let count = AggregateExpr::new(AggregateFunction::Count, column(Type::Chars), "COUNT(c)").unwrap();
        assert_eq!(count.output_type(), Type::Bigint);
        let sum = AggregateExpr::new(AggregateFunction::Sum, column(Type::Int), "SUM(c)").unwrap();
        assert_eq!(sum.input_type(), Type::Int);
        assert_eq!(sum.output_type(), Type::Bigint);
        let fsum = AggregateExpr::new(AggregateFunction::Sum, column(Type::Float), "SUM(c)").unwrap();
        assert_eq!(fsum.output_type(), Type::Float);
        let avg = AggregateExpr::new(AggregateFunction::Avg, column(Type::Int), "AVG(c)").unwrap();
        assert_eq!(avg.output_type(), Type::Float);
        let min = AggregateExpr::new(AggregateFunction::Min, column(Type::Chars), "MIN(c)").unwrap();
        assert_eq!(min.output_type(), Type::Chars);
        assert_eq!(min.output_length(), 10);
        assert_eq!(sum.output_length(), 0);
    }

    #[test]
    fn test_sum_of_text_rejected() {
        let err = AggregateExpr::new(AggregateFunction::Sum, column(Type::Chars), "SUM(c)").unwrap_err();
        assert!(matches!(err, ExecutorError::TypeMismatch { .. }));
    }

    #[test]
    fn test_from_name_and_display() {
        assert_eq!(AggregateFunction::from_name("Sum"), Some(AggregateFunction::Sum));
        assert_eq!(AggregateFunction::from_name("upper"), None);
        assert_eq!(AggregateFunction::Max.to_string(), "MAX");
    }

    // ========================================================================
    // GroupKey
    // ========================================================================

    #[test]
    fn test_group_key_null_equals_null() {
        let a = GroupKey(vec![Value::Null, Value::Int(1)]);
        let b = GroupKey(vec![Value::Null, Value::Int(1)]);
        assert_eq!(a, b);
        assert_eq!(hash_key(&a), hash_key(&b));
    }

    #[test]
    fn test_group_key_cross_type_equality() {
        let a = GroupKey(vec![Value::Int(5), Value::Chars("eng".into())]);
        let b = GroupKey(vec![Value::Bigint(5), Value::Text("eng".into())]);
        assert_eq!(a, b);
        assert_eq!(hash_key(&a), hash_key(&b));
    }

    #[test]
    fn test_group_key_nan() {
        let a = GroupKey(vec![Value::Float(f32::NAN)]);
        let b = GroupKey(vec![Value::Float(f32::NAN)]);
        assert_eq!(a, b);
        assert_eq!(hash_key(&a), hash_key(&b));
    }

    #[test]
    fn test_group_key_differs() {
        assert_ne!(GroupKey(vec![Value::Int(1)]), GroupKey(vec![Value::Int(2)]));
        assert_ne!(GroupKey(vec![Value::Null]), GroupKey(vec![Value::Int(0)]));
        assert_ne!(GroupKey(vec![]), GroupKey(vec![Value::Null]));
    }
}
