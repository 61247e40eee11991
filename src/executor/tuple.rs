//! Row-mode tuples and output column metadata.

use crate::datum::{Type, Value};

use super::error::ExecutorError;

/// One row's ordered values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of cells.
    pub fn cell_num(&self) -> usize {
        self.values.len()
    }

    /// Returns the cell at `index`.
    pub fn cell_at(&self, index: usize) -> Result<&Value, ExecutorError> {
        self.values.get(index).ok_or_else(|| {
            ExecutorError::Internal(format!(
                "cell {} out of bounds for tuple with {} cells",
                index,
                self.values.len()
            ))
        })
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Metadata describing an output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    /// Column name (or alias).
    pub name: String,
    /// Source table name. `None` for computed/expression columns.
    pub table_name: Option<String>,
    /// Attribute type.
    pub ty: Type,
    /// Byte length; 0 when only the type default is known.
    pub len: usize,
}

impl ColumnDesc {
    /// Describes a computed column.
    pub fn computed(name: impl Into<String>, ty: Type, len: usize) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            ty,
            len,
        }
    }

    /// Returns `table.column` for table columns, otherwise the column name.
    pub fn display_name(&self) -> String {
        match &self.table_name {
            Some(table) => format!("{}.{}", table, self.name),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_access() {
        let tuple = Tuple::new(vec![Value::Int(1), Value::Chars("a".into())]);
        assert_eq!(tuple.cell_num(), 2);
        assert_eq!(tuple.cell_at(1).unwrap(), &Value::Chars("a".into()));
        assert!(matches!(tuple.cell_at(2), Err(ExecutorError::Internal(_))));
    }

    #[test]
    fn test_column_display_name() {
        let mut desc = ColumnDesc::computed("dept", Type::Chars, 8);
        assert_eq!(desc.display_name(), "dept");
        desc.table_name = Some("t".into());
        assert_eq!(desc.display_name(), "t.dept");
    }
}
