//! Attribute types and scalar values.
//!
//! [`Type`] enumerates the attribute types a column can hold and [`Value`]
//! is a single tagged scalar. [`Value::compare`] defines a total order over
//! every variant, so sorting and grouping never special-case mixed inputs:
//!
//! - NULL sorts before everything else
//! - Int, Bigint and Float compare numerically with each other
//! - Chars and Text compare as strings with each other
//! - otherwise values of different kinds order by kind
//!
//! Values are encoded into records with [`Value::encode`] and read back with
//! [`Value::decode`] (little-endian fixed-size payloads, length-prefixed strings).

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Errors from casting, parsing or decoding values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatumError {
    /// The value has no conversion to the target type.
    #[error("cannot cast {value} to {target}")]
    InvalidCast {
        /// Rendered source value.
        value: String,
        /// Requested type.
        target: Type,
    },
    /// The value does not fit in the target type.
    #[error("value out of range for type {0}")]
    OutOfRange(Type),
    /// Malformed or out-of-calendar date literal.
    #[error("invalid date: \"{0}\"")]
    InvalidDate(String),
    /// Encoded record data ended early or is malformed.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
    /// A row has a different number of values than its destination has columns.
    #[error("row has {found} values, expected {expected}")]
    RowWidth { expected: usize, found: usize },
}

/// Attribute type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// Fixed-capacity character string.
    Chars,
    /// Long variable-length text.
    Text,
    /// 4-byte signed integer.
    Int,
    /// 8-byte signed integer.
    Bigint,
    /// Single-precision floating point.
    Float,
    /// Boolean.
    Bool,
    /// Calendar date stored as packed `yyyymmdd`.
    Date,
}

impl Type {
    /// Returns the SQL display name for this type (e.g., `"INT"`, `"CHARS"`).
    pub const fn display_name(self) -> &'static str {
        match self {
            Type::Chars => "CHARS",
            Type::Text => "TEXT",
            Type::Int => "INT",
            Type::Bigint => "BIGINT",
            Type::Float => "FLOAT",
            Type::Bool => "BOOLEAN",
            Type::Date => "DATE",
        }
    }

    /// Returns the byte length used for a column of this type when no
    /// explicit length is known.
    pub const fn default_length(self) -> usize {
        match self {
            Type::Int | Type::Float | Type::Bool | Type::Date | Type::Chars => 4,
            Type::Bigint => 8,
            Type::Text => 4096,
        }
    }

    /// Returns the encoded size for fixed-size types, or `None` for strings.
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Type::Bool => Some(1),
            Type::Int | Type::Float | Type::Date => Some(4),
            Type::Bigint => Some(8),
            Type::Chars | Type::Text => None,
        }
    }

    /// Returns true for Int, Bigint and Float.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Bigint | Type::Float)
    }

    /// Returns true for Chars and Text.
    pub const fn is_string(self) -> bool {
        matches!(self, Type::Chars | Type::Text)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Chars => "chars",
            Type::Text => "text",
            Type::Int => "int",
            Type::Bigint => "bigint",
            Type::Float => "float",
            Type::Bool => "boolean",
            Type::Date => "date",
        };
        write!(f, "{}", name)
    }
}

/// A typed scalar value.
///
/// `PartialEq` is structural (`Int(1) != Bigint(1)`); use [`Value::compare`]
/// for SQL comparison semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL (type is unknown/any).
    Null,
    /// Boolean (true/false).
    Boolean(bool),
    /// 32-bit signed integer (INT).
    Int(i32),
    /// 64-bit signed integer (BIGINT).
    Bigint(i64),
    /// 32-bit floating point (FLOAT).
    Float(f32),
    /// Date packed as `yyyymmdd`.
    Date(u32),
    /// Character string (CHARS).
    Chars(String),
    /// Long text (TEXT).
    Text(String),
}

impl Value {
    /// Returns the attribute type of this value, or `None` for Null.
    pub fn attr_type(&self) -> Option<Type> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(Type::Bool),
            Value::Int(_) => Some(Type::Int),
            Value::Bigint(_) => Some(Type::Bigint),
            Value::Float(_) => Some(Type::Float),
            Value::Date(_) => Some(Type::Date),
            Value::Chars(_) => Some(Type::Chars),
            Value::Text(_) => Some(Type::Text),
        }
    }

    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the byte length of this value: the fixed size for fixed-size
    /// types, the UTF-8 length for strings, and 0 for NULL.
    pub fn length(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Chars(s) | Value::Text(s) => s.len(),
            other => other
                .attr_type()
                .and_then(Type::fixed_size)
                .unwrap_or_default(),
        }
    }

    /// Returns the value as `i64` for Int and Bigint.
    pub fn get_bigint(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(i64::from(*n)),
            Value::Bigint(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as `f64` for any numeric variant.
    pub fn get_double(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(f64::from(*n)),
            Value::Bigint(n) => Some(*n as f64),
            Value::Float(n) => Some(f64::from(*n)),
            _ => None,
        }
    }

    /// Returns the string payload of Chars and Text.
    pub fn get_string(&self) -> Option<&str> {
        match self {
            Value::Chars(s) | Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Ordering rank of the value's kind, used when kinds differ.
    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int(_) | Value::Bigint(_) | Value::Float(_) => 2,
            Value::Date(_) => 3,
            Value::Chars(_) | Value::Text(_) => 4,
        }
    }

    /// Three-way comparison with SQL ordering semantics.
    ///
    /// This is a total order: NULL equals NULL and sorts first, floats use
    /// IEEE total ordering with `-0.0` equal to `0.0` and every NaN equal
    /// to every other, and integers compared with integers never go through
    /// floating point.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => {
                canonical_float(f64::from(*a)).total_cmp(&canonical_float(f64::from(*b)))
            }
            (Value::Chars(a) | Value::Text(a), Value::Chars(b) | Value::Text(b)) => a.cmp(b),
            (a, b) if a.kind_rank() == 2 && b.kind_rank() == 2 => {
                match (a.get_bigint(), b.get_bigint()) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    _ => {
                        let x = canonical_float(a.get_double().unwrap_or_default());
                        let y = canonical_float(b.get_double().unwrap_or_default());
                        x.total_cmp(&y)
                    }
                }
            }
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }

    /// Feeds a hash consistent with [`Value::compare`] into `state`: values
    /// that compare equal hash identically.
    pub fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.kind_rank().hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            // Numerics compare through f64 across variants, so hash the same way.
            Value::Int(_) | Value::Bigint(_) | Value::Float(_) => {
                canonical_float(self.get_double().unwrap_or_default())
                    .to_bits()
                    .hash(state)
            }
            Value::Date(d) => d.hash(state),
            Value::Chars(s) | Value::Text(s) => s.hash(state),
        }
    }

    /// Converts this value to `target`.
    ///
    /// NULL casts to NULL of any type. Narrowing numeric casts fail with
    /// [`DatumError::OutOfRange`] instead of wrapping; floats round to the
    /// nearest integer.
    pub fn cast_to(&self, target: Type) -> Result<Value, DatumError> {
        if self.is_null() || self.attr_type() == Some(target) {
            return Ok(self.clone());
        }
        let cast = match (self, target) {
            (Value::Int(n), Type::Bigint) => Value::Bigint(i64::from(*n)),
            (Value::Int(n), Type::Float) => Value::Float(*n as f32),
            (Value::Bigint(n), Type::Int) => {
                Value::Int(i32::try_from(*n).map_err(|_| DatumError::OutOfRange(Type::Int))?)
            }
            (Value::Bigint(n), Type::Float) => Value::Float(*n as f32),
            (Value::Float(n), Type::Int) => {
                let rounded = f64::from(n.round());
                if !(f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&rounded) {
                    return Err(DatumError::OutOfRange(Type::Int));
                }
                Value::Int(rounded as i32)
            }
            (Value::Float(n), Type::Bigint) => {
                let rounded = f64::from(n.round());
                if !(i64::MIN as f64..i64::MAX as f64).contains(&rounded) {
                    return Err(DatumError::OutOfRange(Type::Bigint));
                }
                Value::Bigint(rounded as i64)
            }
            (Value::Boolean(b), Type::Int) => Value::Int(i32::from(*b)),
            (Value::Chars(s), Type::Text) => Value::Text(s.clone()),
            (Value::Text(s), Type::Chars) => Value::Chars(s.clone()),
            (Value::Chars(s) | Value::Text(s), Type::Date) => Value::Date(parse_date(s)?),
            (_, Type::Chars) => Value::Chars(self.to_string()),
            (_, Type::Text) => Value::Text(self.to_string()),
            _ => {
                return Err(DatumError::InvalidCast {
                    value: self.to_string(),
                    target,
                });
            }
        };
        Ok(cast)
    }

    /// Appends the encoded payload of this value to `buf`.
    ///
    /// NULL writes nothing (NULLs are tracked by the record's null bitmap).
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        match self {
            Value::Null => {}
            Value::Boolean(b) => buf.put_u8(u8::from(*b)),
            Value::Int(n) => buf.put_i32_le(*n),
            Value::Bigint(n) => buf.put_i64_le(*n),
            Value::Float(n) => buf.put_f32_le(*n),
            Value::Date(d) => buf.put_u32_le(*d),
            Value::Chars(s) | Value::Text(s) => {
                buf.put_u32_le(s.len() as u32);
                buf.put_slice(s.as_bytes());
            }
        }
    }

    /// Reads one non-NULL value of type `ty` from the front of `buf`.
    pub fn decode<B: Buf>(buf: &mut B, ty: Type) -> Result<Value, DatumError> {
        let need = ty.fixed_size().unwrap_or(4);
        if buf.remaining() < need {
            return Err(DatumError::InvalidEncoding(format!(
                "need {} bytes for {}, have {}",
                need,
                ty,
                buf.remaining()
            )));
        }
        let value = match ty {
            Type::Bool => Value::Boolean(buf.get_u8() != 0),
            Type::Int => Value::Int(buf.get_i32_le()),
            Type::Bigint => Value::Bigint(buf.get_i64_le()),
            Type::Float => Value::Float(buf.get_f32_le()),
            Type::Date => Value::Date(buf.get_u32_le()),
            Type::Chars | Type::Text => {
                let len = buf.get_u32_le() as usize;
                if buf.remaining() < len {
                    return Err(DatumError::InvalidEncoding(format!(
                        "string of {} bytes truncated to {}",
                        len,
                        buf.remaining()
                    )));
                }
                let mut bytes = vec![0; len];
                buf.copy_to_slice(&mut bytes);
                let s = String::from_utf8(bytes)
                    .map_err(|e| DatumError::InvalidEncoding(e.to_string()))?;
                if ty == Type::Chars {
                    Value::Chars(s)
                } else {
                    Value::Text(s)
                }
            }
        };
        Ok(value)
    }
}

/// Folds `-0.0` into `0.0` and every NaN into one NaN.
fn canonical_float(x: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else if x.is_nan() {
        f64::NAN
    } else {
        x
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bigint(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Date(d) => write!(f, "{}", format_date(*d)),
            Value::Chars(s) | Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Parses a `YYYY-MM-DD` literal into packed `yyyymmdd` form.
///
/// Rejects dates outside years 1..=9999 and days that do not exist in the
/// given month (leap years included).
pub fn parse_date(s: &str) -> Result<u32, DatumError> {
    let invalid = || DatumError::InvalidDate(s.to_string());
    let mut parts = s.trim().splitn(3, '-');
    let mut field = || -> Result<u32, DatumError> {
        parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(invalid)
    };
    let (year, month, day) = (field()?, field()?, field()?);
    if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
        return Err(invalid());
    }
    if day == 0 || day > days_in_month(year, month) {
        return Err(invalid());
    }
    Ok(year * 10000 + month * 100 + day)
}

/// Formats a packed `yyyymmdd` date as `YYYY-MM-DD`.
pub fn format_date(packed: u32) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        packed / 10000,
        packed / 100 % 100,
        packed % 100
    )
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}
