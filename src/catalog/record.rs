//! Encoded table records.
//!
//! # Layout
//!
//! ```text
//! +----------------------+-----------------------------------------+
//! | null bitmap          | non-NULL values in field order          |
//! | ceil(n / 8) bytes    | (see `Value::encode`)                   |
//! +----------------------+-----------------------------------------+
//! ```
//!
//! Bit `i % 8` of byte `i / 8` is set when field `i` is NULL.

use bytes::{Bytes, BytesMut};

use crate::datum::{DatumError, Type, Value};

/// An immutable encoded row. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    data: Bytes,
}

impl Record {
    /// Encodes `values`, which must already have the field types.
    pub(crate) fn encode(values: &[Value]) -> Self {
        let bitmap_len = values.len().div_ceil(8);
        let mut buf = BytesMut::with_capacity(bitmap_len + values.len() * 8);
        buf.resize(bitmap_len, 0);
        for (i, value) in values.iter().enumerate() {
            if value.is_null() {
                buf[i / 8] |= 1 << (i % 8);
            }
        }
        for value in values {
            value.encode(&mut buf);
        }
        Self { data: buf.freeze() }
    }

    /// Decodes the record against the field types.
    pub(crate) fn decode(&self, types: &[Type]) -> Result<Vec<Value>, DatumError> {
        let bitmap_len = types.len().div_ceil(8);
        if self.data.len() < bitmap_len {
            return Err(DatumError::InvalidEncoding(format!(
                "record of {} bytes is shorter than its null bitmap",
                self.data.len()
            )));
        }
        let (bitmap, mut payload) = self.data.split_at(bitmap_len);
        let values = types
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                if bitmap[i / 8] & (1 << (i % 8)) != 0 {
                    Ok(Value::Null)
                } else {
                    Value::decode(&mut payload, *ty)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        if !payload.is_empty() {
            return Err(DatumError::InvalidEncoding(format!(
                "{} trailing bytes after last field",
                payload.len()
            )));
        }
        Ok(values)
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
