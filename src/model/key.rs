//! Composite match keys used by lookups, joins and distinct copies

use rustc_hash::FxHashMap;

use crate::error::Result;

use super::table::Table;
use super::value::{CellValue, NumericKey};

/// Normalized form of one key component.
///
/// Strings fold case, and integral floats collapse onto integers so that
/// `Int32(2)` and `Float64(2.0)` produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Text(String),
    Int(i64),
    Float(u64),
    Other(String),
}

impl KeyPart {
    /// Normalize a cell, or `None` for null/blank values, which never match
    pub fn from_cell(value: &CellValue) -> Option<Self> {
        if value.is_blank() {
            return None;
        }
        let part = match value {
            CellValue::String(s) => KeyPart::Text(s.to_lowercase()),
            v => match NumericKey::of(v) {
                Some(NumericKey::Integral(i)) => KeyPart::Int(i),
                Some(NumericKey::Bits(bits)) => KeyPart::Float(bits),
                None => KeyPart::Other(v.to_string()),
            },
        };
        Some(part)
    }
}

/// Builder for computing composite keys
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    column_indices: Vec<usize>,
}

impl KeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key columns by index
    pub fn with_columns(mut self, indices: Vec<usize>) -> Self {
        self.column_indices = indices;
        self
    }

    /// Build a key from a row's cells; `None` if any component is null or blank
    pub fn build_key(&self, cells: &[CellValue]) -> Option<Vec<KeyPart>> {
        self.column_indices
            .iter()
            .map(|&i| cells.get(i).and_then(KeyPart::from_cell))
            .collect()
    }

    /// Get the column indices
    pub fn column_indices(&self) -> &[usize] {
        &self.column_indices
    }

    /// Key of one table row, read through the table's cell accessor
    pub fn row_key(&self, table: &Table, row: usize) -> Result<Option<Vec<KeyPart>>> {
        let mut key = Vec::with_capacity(self.column_indices.len());
        for &col in &self.column_indices {
            match KeyPart::from_cell(&table.get_field_value(row, col)?) {
                Some(part) => key.push(part),
                None => return Ok(None),
            }
        }
        Ok(Some(key))
    }

    /// Index every row of `table` by key, preserving row order per key
    pub fn index_rows(&self, table: &Table) -> Result<FxHashMap<Vec<KeyPart>, Vec<usize>>> {
        let mut index: FxHashMap<Vec<KeyPart>, Vec<usize>> = FxHashMap::default();
        for row in 0..table.row_count() {
            if let Some(key) = self.row_key(table, row)? {
                index.entry(key).or_default().push(row);
            }
        }
        Ok(index)
    }
}
