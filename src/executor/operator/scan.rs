use std::sync::Arc;

use crate::catalog::{Record, Table};
use crate::chunk::{Chunk, Column};
use crate::tx::Transaction;

use super::super::error::ExecutorError;
use super::super::tuple::{ColumnDesc, Tuple};

/// Sequential scan over the records a transaction can see.
///
/// The visible record set is captured at `open`, so rows inserted through the
/// same transaction while the scan runs are not returned.
pub struct TableScan {
    table: Arc<Table>,
    schema: Vec<ColumnDesc>,
    records: Vec<Record>,
    cursor: usize,
    current: Option<Tuple>,
}

impl TableScan {
    pub fn new(table: Arc<Table>) -> Self {
        let schema = table
            .fields()
            .iter()
            .map(|f| ColumnDesc {
                name: f.name.clone(),
                table_name: Some(table.name().to_string()),
                ty: f.attr_type,
                len: f.len,
            })
            .collect();
        Self {
            table,
            schema,
            records: Vec::new(),
            cursor: 0,
            current: None,
        }
    }

    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    pub(super) fn open(&mut self, trx: &dyn Transaction) -> Result<(), ExecutorError> {
        self.records = trx.visible_records(&self.table);
        self.cursor = 0;
        self.current = None;
        Ok(())
    }

    pub(super) fn next(&mut self) -> Result<bool, ExecutorError> {
        let Some(record) = self.records.get(self.cursor) else {
            self.current = None;
            return Ok(false);
        };
        let values = self.table.decode_record(record)?;
        self.cursor += 1;
        self.current = Some(Tuple::new(values));
        Ok(true)
    }

    pub(super) fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    pub(super) fn tuple_schema(&self) -> &[ColumnDesc] {
        &self.schema
    }

    pub(super) fn next_chunk(&mut self, chunk: &mut Chunk) -> Result<bool, ExecutorError> {
        if self.cursor >= self.records.len() {
            return Ok(false);
        }
        let end = self.records.len().min(self.cursor + Chunk::MAX_ROWS);

        chunk.reset();
        for field in self.table.fields() {
            chunk.add_column(
                Column::with_capacity(field.attr_type, field.len, end - self.cursor),
                field.field_id,
            );
        }
        for record in &self.records[self.cursor..end] {
            chunk.append_row(self.table.decode_record(record)?)?;
        }
        self.cursor = end;
        Ok(true)
    }

    pub(super) fn close(&mut self) -> Result<(), ExecutorError> {
        self.records = Vec::new();
        self.cursor = 0;
        self.current = None;
        Ok(())
    }
}
