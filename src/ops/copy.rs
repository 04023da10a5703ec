//! Copy/filter: project columns, select rows, optionally keep distinct tuples

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::model::{CellValue, KeyBuilder, KeyPart, Table};

use super::{renamed, Problems, RowFilter};

const ROUTINE: &str = "copy_table";

/// Options for copying rows between tables
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Source columns to copy; empty copies all
    pub columns: Vec<String>,
    /// Source name to output name
    pub rename: IndexMap<String, String>,
    pub filter: RowFilter,
    /// Keep only the first row per distinct tuple of these columns
    pub distinct: Vec<String>,
}

impl CopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.insert(from.into(), to.into());
        self
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_distinct(mut self, columns: Vec<String>) -> Self {
        self.distinct = columns;
        self
    }
}

/// Copy selected rows and columns of `source` into a new table
pub fn copy_table(source: &Table, options: &CopyOptions) -> Result<Table> {
    let mut dest = Table::new(Vec::new())
        .with_identifier(source.identifier())
        .with_logger(source.logger().clone());
    copy_into(source, &mut dest, options)?;
    Ok(dest)
}

/// Append selected rows of `source` to `dest`, creating missing output columns.
/// Returns the number of rows copied.
pub fn copy_into(source: &Table, dest: &mut Table, options: &CopyOptions) -> Result<usize> {
    let source_columns: Vec<usize> = if options.columns.is_empty() {
        (0..source.column_count()).collect()
    } else {
        options
            .columns
            .iter()
            .map(|name| source.field_index(name))
            .collect::<Result<_>>()?
    };
    let filter = options.filter.compile(source)?;
    let distinct = KeyBuilder::new().with_columns(
        options
            .distinct
            .iter()
            .map(|name| source.field_index(name))
            .collect::<Result<_>>()?,
    );

    let mut mapping = Vec::with_capacity(source_columns.len());
    for &src in &source_columns {
        let mut column = source.columns()[src].clone();
        column.name = renamed(&options.rename, &column.name);
        let dst = match dest.column_index(&column.name) {
            Some(idx) => idx,
            None => dest.add_field(column, CellValue::Null, None)?,
        };
        mapping.push((src, dst));
    }

    let mut seen: FxHashSet<Vec<KeyPart>> = FxHashSet::default();
    let mut problems = Problems::new();
    let mut copied = 0;
    for row in 0..source.row_count() {
        if !filter.accepts(source, row)? {
            continue;
        }
        let cells: Vec<CellValue> = (0..source.column_count())
            .map(|c| source.get_field_value(row, c))
            .collect::<Result<_>>()?;
        if !distinct.column_indices().is_empty() {
            // Tuples containing a blank value never count as duplicates
            if let Some(key) = distinct.build_key(&cells) {
                if !seen.insert(key) {
                    continue;
                }
            }
        }

        let mut record = vec![CellValue::Null; dest.column_count()];
        for &(src, dst) in &mapping {
            let value = cells[src].clone();
            match dest.columns()[dst].coerce(value) {
                Ok(v) => record[dst] = v,
                Err(e) => problems.push(row, e),
            }
        }
        dest.add_record(record)?;
        copied += 1;
    }

    source.logger().debug(ROUTINE, format!("copied {} rows", copied));
    problems.finish(ROUTINE, source.logger())?;
    Ok(copied)
}
