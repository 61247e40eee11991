//! Databases, tables and records.
//!
//! A [`Db`] owns its tables and the [`TransactionManager`] that scopes
//! writes to them. Tables hold committed [`Record`]s in memory; new rows
//! reach a table only through a transaction's commit.
//!
//! ## Usage
//!
//! ```
//! use tributary::catalog::{AttrInfo, Db, StorageFormat};
//! use tributary::datum::Type;
//!
//! let db = Db::new("sys");
//! let attrs = [AttrInfo::new("id", Type::Int, 4)];
//! db.create_table("t", &attrs, &[], StorageFormat::Row).unwrap();
//! assert!(db.find_table("t").is_some());
//! ```

mod error;
mod record;
mod table;

pub use error::CatalogError;
pub use record::Record;
pub use table::{AttrInfo, FieldMeta, StorageFormat, Table, TableId};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::tx::TransactionManager;

struct DbState {
    next_table_id: u32,
    tables: HashMap<String, Arc<Table>>,
}

/// A database: a namespace of tables plus their transaction manager.
pub struct Db {
    name: String,
    state: RwLock<DbState>,
    tx_manager: Arc<TransactionManager>,
}

impl Db {
    /// Creates an empty database.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(DbState {
                next_table_id: 1,
                tables: HashMap::new(),
            }),
            tx_manager: Arc::new(TransactionManager::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tx_manager(&self) -> &Arc<TransactionManager> {
        &self.tx_manager
    }

    /// Creates a table.
    ///
    /// Column names must be unique (case-insensitive) and every primary key
    /// must name one of them. Only [`StorageFormat::Row`] is supported.
    pub fn create_table(
        &self,
        name: &str,
        attrs: &[AttrInfo],
        primary_keys: &[String],
        format: StorageFormat,
    ) -> Result<Arc<Table>, CatalogError> {
        if format != StorageFormat::Row {
            return Err(CatalogError::UnsupportedFormat(format));
        }
        if attrs.is_empty() {
            return Err(CatalogError::EmptySchema {
                name: name.to_string(),
            });
        }
        for (i, attr) in attrs.iter().enumerate() {
            if attrs[..i]
                .iter()
                .any(|a| a.name.eq_ignore_ascii_case(&attr.name))
            {
                return Err(CatalogError::DuplicateColumn {
                    name: attr.name.clone(),
                });
            }
        }
        if let Some(pk) = primary_keys
            .iter()
            .find(|pk| !attrs.iter().any(|a| a.name.eq_ignore_ascii_case(pk)))
        {
            return Err(CatalogError::UnknownPrimaryKey { name: pk.clone() });
        }

        let mut state = self.state.write();
        if state.tables.contains_key(name) {
            return Err(CatalogError::TableAlreadyExists {
                name: name.to_string(),
            });
        }
        let id = TableId(state.next_table_id);
        state.next_table_id += 1;

        let fields = attrs
            .iter()
            .enumerate()
            .map(|(field_id, attr)| FieldMeta {
                name: attr.name.clone(),
                attr_type: attr.attr_type,
                len: attr.length,
                field_id,
            })
            .collect();
        let table = Arc::new(Table::new(
            id,
            name.to_string(),
            fields,
            primary_keys.to_vec(),
            format,
        ));
        state.tables.insert(name.to_string(), Arc::clone(&table));
        debug!(db = %self.name, table = name, table_id = %id, "created table");
        Ok(table)
    }

    /// Looks up a table by name.
    pub fn find_table(&self, name: &str) -> Option<Arc<Table>> {
        self.state.read().tables.get(name).cloned()
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().tables.keys().cloned().collect();
        names.sort();
        names
    }
}
