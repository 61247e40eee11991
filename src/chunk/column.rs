//! Typed value column.

use std::ops::Range;

use crate::datum::{DatumError, Type, Value};

/// A typed, contiguous run of values belonging to one attribute.
///
/// Every non-NULL value stored in a column has the column's attribute type;
/// [`Column::append_value`] casts mismatched inputs on the way in.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    attr_type: Type,
    attr_len: usize,
    values: Vec<Value>,
}

impl Column {
    /// Creates an empty column.
    pub fn new(attr_type: Type, attr_len: usize) -> Self {
        Self {
            attr_type,
            attr_len,
            values: Vec::new(),
        }
    }

    /// Creates an empty column with room for `capacity` values.
    pub fn with_capacity(attr_type: Type, attr_len: usize, capacity: usize) -> Self {
        Self {
            attr_type,
            attr_len,
            values: Vec::with_capacity(capacity),
        }
    }

    /// Creates a column from already-typed values.
    ///
    /// Values are cast to `attr_type` where their type differs.
    pub fn from_values(
        attr_type: Type,
        attr_len: usize,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Self, DatumError> {
        let mut column = Self::new(attr_type, attr_len);
        for value in values {
            column.append_value(value)?;
        }
        Ok(column)
    }

    /// Returns an empty column with the same type and length.
    pub fn empty_like(&self) -> Self {
        Self::new(self.attr_type, self.attr_len)
    }

    pub fn attr_type(&self) -> Type {
        self.attr_type
    }

    pub fn attr_len(&self) -> usize {
        self.attr_len
    }

    /// Changes the attribute type. Only valid on an empty column, since
    /// stored values are not converted.
    pub fn set_attr_type(&mut self, attr_type: Type, attr_len: usize) {
        debug_assert!(self.values.is_empty());
        self.attr_type = attr_type;
        self.attr_len = attr_len;
    }

    /// Number of values in the column.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Appends a value, casting it to the column type if needed.
    pub fn append_value(&mut self, value: Value) -> Result<(), DatumError> {
        let value = match value.attr_type() {
            None => value,
            Some(ty) if ty == self.attr_type => value,
            Some(_) => value.cast_to(self.attr_type)?,
        };
        self.values.push(value);
        Ok(())
    }

    /// Returns the value at `index`.
    pub fn get_value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns all values in row order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Copies the values in `range` into a new column of the same type.
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds.
    pub fn slice(&self, range: Range<usize>) -> Column {
        Self {
            attr_type: self.attr_type,
            attr_len: self.attr_len,
            values: self.values[range].to_vec(),
        }
    }

    /// Drops all values, keeping type, length and allocation.
    pub fn reset_data(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_casts_to_column_type() {
        let mut column = Column::new(Type::Bigint, 8);
        column.append_value(Value::Int(3)).unwrap();
        column.append_value(Value::Null).unwrap();
        assert_eq!(column.values(), &[Value::Bigint(3), Value::Null]);
    }

    #[test]
    fn test_append_rejects_invalid_cast() {
        let mut column = Column::new(Type::Date, 4);
        let err = column.append_value(Value::Chars("tomorrow".into())).unwrap_err();
        assert!(matches!(err, DatumError::InvalidDate(_)));
        assert!(column.is_empty());
    }

    #[test]
    fn test_reset_data_keeps_type() {
        let mut column = Column::from_values(Type::Int, 4, [Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(column.len(), 2);
        column.reset_data();
        assert!(column.is_empty());
        assert_eq!(column.attr_type(), Type::Int);
        assert_eq!(column.get_value(0), None);
    }
}
