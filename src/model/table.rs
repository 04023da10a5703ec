//! Table, Row, and the structural/cell API

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TableError};
use crate::logger::Logger;

use super::schema::Column;
use super::value::CellValue;

/// A row in the table
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Cell values in column order
    pub cells: Vec<CellValue>,
    /// Original line/record number in the source file (1-indexed), if read from one
    pub source_line: Option<usize>,
}

impl Row {
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self {
            cells,
            source_line: None,
        }
    }

    /// A row of nulls
    pub fn empty(width: usize) -> Self {
        Self::new(vec![CellValue::Null; width])
    }

    pub fn with_source_line(mut self, line: usize) -> Self {
        self.source_line = Some(line);
        self
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }
}

/// Strategy for reading cells that are not held in memory
pub trait CellSource: fmt::Debug + Send + Sync {
    fn row_count(&self) -> usize;

    fn read_cell(&self, row: usize, column: usize, descriptor: &Column) -> Result<CellValue>;
}

/// Generated back-fill for a newly added column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldInit {
    /// 1, 2, 3, ...
    RowNumberFromOne,
    /// 0, 1, 2, ...
    RowNumberFromZero,
}

/// A cell whose stored value was substituted during a read
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    pub row: usize,
    pub column: usize,
    /// The text found in the file
    pub raw: String,
    /// The value stored instead
    pub value: CellValue,
}

/// A table containing columns and rows
#[derive(Debug, Clone, Default)]
pub struct Table {
    identifier: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
    comments: Vec<String>,
    substitutions: Vec<Substitution>,
    source: Option<Arc<dyn CellSource>>,
    logger: Logger,
}

impl Table {
    /// Create a new empty table with column definitions
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Back this table by an external cell source instead of in-memory rows
    pub fn with_cell_source(mut self, source: Arc<dyn CellSource>) -> Self {
        self.rows.clear();
        self.source = Some(source);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.identifier = identifier.into();
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Materialized rows. Empty for a table read on the fly.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn add_comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }

    /// Cells whose file text was replaced by a substitute value while reading
    pub fn substitutions(&self) -> &[Substitution] {
        &self.substitutions
    }

    pub(crate) fn record_substitution(&mut self, substitution: Substitution) {
        self.substitutions.push(substitution);
    }

    /// Whether rows live in memory (as opposed to being read on demand)
    pub fn has_materialized_rows(&self) -> bool {
        self.source.is_none()
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        match &self.source {
            Some(source) => source.row_count(),
            None => self.rows.len(),
        }
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get column index by name (case-insensitive)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.is_named(name))
    }

    /// Like [`Table::column_index`], failing with `NotFound`
    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            TableError::not_found(format!("column '{}' in table '{}'", name, self.identifier))
        })
    }

    /// Get column by name (case-insensitive)
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    /// Read every row from the cell source into memory and drop the source
    pub fn materialize(&mut self) -> Result<()> {
        let Some(source) = self.source.take() else {
            return Ok(());
        };
        let mut rows = Vec::with_capacity(source.row_count());
        for row_idx in 0..source.row_count() {
            let cells = self
                .columns
                .iter()
                .enumerate()
                .map(|(col_idx, column)| source.read_cell(row_idx, col_idx, column))
                .collect::<Result<Vec<_>>>();
            match cells {
                Ok(cells) => rows.push(Row::new(cells).with_source_line(row_idx + 1)),
                Err(e) => {
                    self.source = Some(source);
                    return Err(e);
                }
            }
        }
        self.rows = rows;
        Ok(())
    }

    fn check_column(&self, index: usize) -> Result<()> {
        if index < self.columns.len() {
            Ok(())
        } else {
            Err(TableError::not_found(format!(
                "column index {} (table has {} columns)",
                index,
                self.columns.len()
            )))
        }
    }

    fn check_row(&self, index: usize) -> Result<()> {
        if index < self.row_count() {
            Ok(())
        } else {
            Err(TableError::not_found(format!(
                "row index {} (table has {} rows)",
                index,
                self.row_count()
            )))
        }
    }

    // ------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------

    /// Append a column, back-filling existing rows. Returns the new column index.
    pub fn add_field(
        &mut self,
        column: Column,
        init_value: CellValue,
        init: Option<FieldInit>,
    ) -> Result<usize> {
        let index = self.columns.len();
        self.insert_field(index, column, init_value, init)
    }

    /// Insert a column at `index`, back-filling existing rows
    pub fn insert_field(
        &mut self,
        index: usize,
        column: Column,
        init_value: CellValue,
        init: Option<FieldInit>,
    ) -> Result<usize> {
        if self.column_index(&column.name).is_some() {
            return Err(TableError::DuplicateColumn(column.name));
        }
        if index > self.columns.len() {
            return Err(TableError::not_found(format!(
                "insert position {} (table has {} columns)",
                index,
                self.columns.len()
            )));
        }
        self.materialize()?;

        let fill = column.coerce(init_value)?;
        let mut values = Vec::with_capacity(self.rows.len());
        for row_idx in 0..self.rows.len() {
            let value = match init {
                Some(FieldInit::RowNumberFromOne) => column.coerce(CellValue::Int64(row_idx as i64 + 1))?,
                Some(FieldInit::RowNumberFromZero) => column.coerce(CellValue::Int64(row_idx as i64))?,
                None => fill.clone(),
            };
            values.push(value);
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.cells.insert(index, value);
        }
        self.columns.insert(index, column);
        Ok(index)
    }

    /// Remove a column and its slot in every row
    pub fn delete_field(&mut self, index: usize) -> Result<Column> {
        self.check_column(index)?;
        self.materialize()?;
        for row in &mut self.rows {
            row.cells.remove(index);
        }
        Ok(self.columns.remove(index))
    }

    pub fn rename_field(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.check_column(index)?;
        let name = name.into();
        if let Some(existing) = self.column_index(&name) {
            if existing != index {
                return Err(TableError::DuplicateColumn(name));
            }
        }
        self.columns[index].name = name;
        Ok(())
    }

    /// Replace a column descriptor. Stored cells are not reformatted.
    pub fn set_field_descriptor(&mut self, index: usize, column: Column) -> Result<()> {
        self.check_column(index)?;
        if let Some(existing) = self.column_index(&column.name) {
            if existing != index {
                return Err(TableError::DuplicateColumn(column.name));
            }
        }
        self.columns[index] = column;
        Ok(())
    }

    /// Change a column's declared type. Stored cells are not reformatted.
    pub fn set_field_type(&mut self, index: usize, value_type: super::ValueType) -> Result<()> {
        self.check_column(index)?;
        self.columns[index].value_type = value_type;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rows
    // ------------------------------------------------------------------

    fn conform(&self, cells: Vec<CellValue>) -> Result<Vec<CellValue>> {
        if cells.len() != self.columns.len() {
            return Err(TableError::schema(format!(
                "record has {} values but table '{}' has {} columns",
                cells.len(),
                self.identifier,
                self.columns.len()
            )));
        }
        cells
            .into_iter()
            .zip(&self.columns)
            .map(|(value, column)| column.coerce(value))
            .collect()
    }

    /// Append a row; the record length must equal the column count
    pub fn add_record(&mut self, cells: Vec<CellValue>) -> Result<()> {
        let cells = self.conform(cells)?;
        self.materialize()?;
        self.rows.push(Row::new(cells));
        Ok(())
    }

    /// Append an already-built row, keeping its source line
    pub fn add_row(&mut self, row: Row) -> Result<()> {
        let source_line = row.source_line;
        let cells = self.conform(row.cells)?;
        self.materialize()?;
        self.rows.push(Row { cells, source_line });
        Ok(())
    }

    /// Insert a row at `index`, padding with empty rows when `index` is past the end
    pub fn insert_record(&mut self, index: usize, cells: Vec<CellValue>) -> Result<()> {
        let cells = self.conform(cells)?;
        self.materialize()?;
        self.pad_rows(index);
        self.rows.insert(index, Row::new(cells));
        Ok(())
    }

    pub fn delete_record(&mut self, index: usize) -> Result<Row> {
        self.check_row(index)?;
        self.materialize()?;
        Ok(self.rows.remove(index))
    }

    /// Append empty rows until the table has `count` rows
    pub fn pad_rows(&mut self, count: usize) {
        let width = self.columns.len();
        while self.rows.len() < count {
            self.rows.push(Row::empty(width));
        }
    }

    /// Reorder rows so that output row `i` is original row `order[i]`
    pub(crate) fn reorder_rows(&mut self, order: &[usize]) -> Result<()> {
        self.materialize()?;
        let mut taken: Vec<Option<Row>> = self.rows.drain(..).map(Some).collect();
        let mut rows = Vec::with_capacity(order.len());
        for &i in order {
            let row = taken
                .get_mut(i)
                .and_then(Option::take)
                .ok_or_else(|| TableError::InvalidArgument(format!("invalid row permutation at {}", i)))?;
            rows.push(row);
        }
        self.rows = rows;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cells
    // ------------------------------------------------------------------

    /// Borrow a materialized cell
    pub fn value(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.cells.get(column))
    }

    /// Read a cell, from memory or through the cell source
    pub fn get_field_value(&self, row: usize, column: usize) -> Result<CellValue> {
        self.check_column(column)?;
        self.check_row(row)?;
        match &self.source {
            Some(source) => source.read_cell(row, column, &self.columns[column]),
            None => Ok(self.rows[row].cells[column].clone()),
        }
    }

    pub fn get_field_value_by_name(&self, row: usize, name: &str) -> Result<CellValue> {
        let column = self.field_index(name)?;
        self.get_field_value(row, column)
    }

    /// Write a cell. With `create_if_missing`, empty rows are added up to `row`.
    pub fn set_field_value(
        &mut self,
        row: usize,
        column: usize,
        value: CellValue,
        create_if_missing: bool,
    ) -> Result<()> {
        self.check_column(column)?;
        let value = self.columns[column].coerce(value)?;
        self.materialize()?;
        if create_if_missing {
            self.pad_rows(row + 1);
        }
        self.check_row(row)?;
        self.rows[row].cells[column] = value;
        Ok(())
    }

    pub fn set_field_value_by_name(&mut self, row: usize, name: &str, value: CellValue) -> Result<()> {
        let column = self.field_index(name)?;
        self.set_field_value(row, column, value, false)
    }

    /// Rows whose cells equal `values` in the given columns.
    /// Strings compare case-insensitively.
    pub fn get_records(&self, column_indices: &[usize], values: &[CellValue]) -> Result<Vec<usize>> {
        if column_indices.len() != values.len() {
            return Err(TableError::InvalidArgument(format!(
                "{} lookup columns but {} values",
                column_indices.len(),
                values.len()
            )));
        }
        for &c in column_indices {
            self.check_column(c)?;
        }
        let mut found = Vec::new();
        for row_idx in 0..self.row_count() {
            let mut matched = true;
            for (&col, expected) in column_indices.iter().zip(values) {
                let actual = self.get_field_value(row_idx, col)?;
                if !actual.equals_ignore_case(expected) {
                    matched = false;
                    break;
                }
            }
            if matched {
                found.push(row_idx);
            }
        }
        Ok(found)
    }

    /// Format a cell through its column's declared type and precision
    pub fn formatted_value(&self, row: usize, column: usize) -> Result<String> {
        let value = self.get_field_value(row, column)?;
        self.columns[column].format_value(&value)
    }

    /// Pick a column name not yet used, suffixing `_2`, `_3`, ... as needed
    pub fn unique_name(&self, base: &str) -> String {
        if self.column_index(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| self.column_index(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }
}
