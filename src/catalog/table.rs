//! Table metadata and record storage.

use std::fmt;

use parking_lot::RwLock;

use crate::datum::{Type, Value};

use super::error::CatalogError;
use super::record::Record;

/// Identifier of a table within its database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical layout of a table's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageFormat {
    /// Row-oriented records.
    #[default]
    Row,
    /// Partition-attributes-across pages.
    Pax,
}

/// Column definition used when creating a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrInfo {
    /// Internal column name.
    pub name: String,
    /// Attribute type.
    pub attr_type: Type,
    /// Byte length; the maximum encoded size for strings.
    pub length: usize,
}

impl AttrInfo {
    pub fn new(name: impl Into<String>, attr_type: Type, length: usize) -> Self {
        Self {
            name: name.into(),
            attr_type,
            length,
        }
    }
}

/// A column of a stored table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    /// Internal column name.
    pub name: String,
    /// Attribute type.
    pub attr_type: Type,
    /// Byte length.
    pub len: usize,
    /// Position within the table (0-based).
    pub field_id: usize,
}

/// A stored relation.
///
/// Committed records live in memory behind a lock; uncommitted writes are
/// buffered by the owning transaction and land here on commit.
pub struct Table {
    id: TableId,
    name: String,
    fields: Vec<FieldMeta>,
    primary_keys: Vec<String>,
    format: StorageFormat,
    display_names: RwLock<Vec<String>>,
    records: RwLock<Vec<Record>>,
}

impl Table {
    pub(super) fn new(
        id: TableId,
        name: String,
        fields: Vec<FieldMeta>,
        primary_keys: Vec<String>,
        format: StorageFormat,
    ) -> Self {
        let display_names = fields.iter().map(|f| f.name.clone()).collect();
        Self {
            id,
            name,
            fields,
            primary_keys,
            format,
            display_names: RwLock::new(display_names),
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    pub fn field_num(&self) -> usize {
        self.fields.len()
    }

    /// Looks up a field by name (case-insensitive).
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn format(&self) -> StorageFormat {
        self.format
    }

    /// User-facing column labels, one per field. Defaults to the field names.
    pub fn field_display_names(&self) -> Vec<String> {
        self.display_names.read().clone()
    }

    /// Replaces the user-facing column labels.
    pub fn set_field_display_names(&self, names: Vec<String>) -> Result<(), CatalogError> {
        if names.len() != self.fields.len() {
            return Err(CatalogError::DisplayNameCountMismatch {
                expected: self.fields.len(),
                found: names.len(),
            });
        }
        *self.display_names.write() = names;
        Ok(())
    }

    /// Builds a record from one value per field.
    ///
    /// Values are cast to the field types; strings longer than the field
    /// length are rejected.
    pub fn make_record(&self, column_count: usize, values: &[Value]) -> Result<Record, CatalogError> {
        for found in [column_count, values.len()] {
            if found != self.fields.len() {
                return Err(CatalogError::ColumnCountMismatch {
                    expected: self.fields.len(),
                    found,
                });
            }
        }
        let values = self
            .fields
            .iter()
            .zip(values)
            .map(|(field, value)| -> Result<Value, CatalogError> {
                let value = value.cast_to(field.attr_type)?;
                if let Some(s) = value.get_string()
                    && s.len() > field.len
                {
                    return Err(CatalogError::ValueTooLong {
                        column: field.name.clone(),
                        len: s.len(),
                        max: field.len,
                    });
                }
                Ok(value)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Record::encode(&values))
    }

    /// Decodes a record of this table into field values.
    pub fn decode_record(&self, record: &Record) -> Result<Vec<Value>, CatalogError> {
        let types: Vec<Type> = self.fields.iter().map(|f| f.attr_type).collect();
        Ok(record.decode(&types)?)
    }

    /// Snapshot of the committed records.
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    /// Number of committed records.
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Appends committed records.
    pub(crate) fn append_records(&self, records: impl IntoIterator<Item = Record>) {
        self.records.write().extend(records);
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("records", &self.record_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Table {
        let fields = vec![
            FieldMeta {
                name: "id".into(),
                attr_type: Type::Int,
                len: 4,
                field_id: 0,
            },
            FieldMeta {
                name: "name".into(),
                attr_type: Type::Chars,
                len: 5,
                field_id: 1,
            },
        ];
        Table::new(TableId(1), "people".into(), fields, vec![], StorageFormat::Row)
    }

    #[test]
    fn test_make_record_casts_values() {
        let table = people();
        let record = table
            .make_record(2, &[Value::Bigint(3), Value::Text("ann".into())])
            .unwrap();
        assert_eq!(
            table.decode_record(&record).unwrap(),
            vec![Value::Int(3), Value::Chars("ann".into())]
        );
    }

    #[test]
    fn test_make_record_column_count_mismatch() {
        let table = people();
        let err = table.make_record(1, &[Value::Int(1)]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::ColumnCountMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_make_record_value_too_long() {
        let table = people();
        let err = table
            .make_record(2, &[Value::Int(1), Value::Chars("abcdef".into())])
            .unwrap_err();
        assert!(matches!(err, CatalogError::ValueTooLong { max: 5, .. }));
    }

    #[test]
    fn test_display_names() {
        let table = people();
        assert_eq!(table.field_display_names(), vec!["id", "name"]);
        table
            .set_field_display_names(vec!["Id".into(), "Name".into()])
            .unwrap();
        assert_eq!(table.field_display_names(), vec!["Id", "Name"]);
        assert!(table.set_field_display_names(vec!["x".into()]).is_err());
    }

    #[test]
    fn test_field_lookup_is_case_insensitive() {
        let table = people();
        assert_eq!(table.field("NAME").map(|f| f.field_id), Some(1));
        assert!(table.field("missing").is_none());
    }
}
