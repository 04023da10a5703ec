//! Append rows of one table to another by matching column names

use indexmap::IndexMap;

use crate::error::Result;
use crate::model::{CellValue, Table};

use super::{renamed, GlobPattern, Problems, RowFilter};

const ROUTINE: &str = "append_table";

/// Options for appending one table to another
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Globs over source column names; empty takes every column
    pub columns: Vec<String>,
    /// Source name to destination name
    pub rename: IndexMap<String, String>,
    pub filter: RowFilter,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(mut self, patterns: Vec<String>) -> Self {
        self.columns = patterns;
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
}

/// Append the rows of `source` to `dest`. Only columns present in `dest`
/// with the same value type are copied; mismatched columns stay null.
/// Returns the number of rows appended.
pub fn append_table(dest: &mut Table, source: &Table, options: &AppendOptions) -> Result<usize> {
    let patterns = options
        .columns
        .iter()
        .map(|p| GlobPattern::new(p))
        .collect::<Result<Vec<_>>>()?;
    let filter = options.filter.compile(source)?;
    let logger = dest.logger().clone();

    let mut mapping = Vec::new();
    for (src, column) in source.columns().iter().enumerate() {
        if !patterns.is_empty() && !patterns.iter().any(|p| p.matches(&column.name)) {
            continue;
        }
        let name = renamed(&options.rename, &column.name);
        let Some(dst) = dest.column_index(&name) else {
            continue;
        };
        let dest_type = &dest.columns()[dst].value_type;
        if *dest_type != column.value_type {
            logger.warn(
                ROUTINE,
                format!(
                    "skipping column '{}': source type {} does not match destination type {}",
                    column.name, column.value_type, dest_type
                ),
            );
            continue;
        }
        mapping.push((src, dst));
    }

    let mut problems = Problems::new();
    let mut appended = 0;
    for row in 0..source.row_count() {
        if !filter.accepts(source, row)? {
            continue;
        }
        let mut record = vec![CellValue::Null; dest.column_count()];
        for &(src, dst) in &mapping {
            match source.get_field_value(row, src) {
                Ok(value) => record[dst] = value,
                Err(e) => problems.push(row, e),
            }
        }
        dest.add_record(record)?;
        appended += 1;
    }

    logger.debug(ROUTINE, format!("appended {} rows", appended));
    problems.finish(ROUTINE, &logger)?;
    Ok(appended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{CollectingObserver, Level, Logger};
    use crate::model::{Column, ValueType};

    #[test]
    fn test_append_matches_names_and_skips_mismatched_types() {
        let observer = CollectingObserver::new();
        let mut dest = Table::new(vec![
            Column::string("site", 10),
            Column::integer("count"),
            Column::double("flow", 1),
        ])
        .with_logger(Logger::with_observer(observer.clone()));
        dest.add_record(vec!["Ash".into(), CellValue::Int32(1), CellValue::Float64(1.0)])
            .unwrap();

        let mut source = Table::new(vec![
            Column::string("SITE", 10),
            Column::string("count", 4),
            Column::double("q", 1),
            Column::string("extra", 4),
        ]);
        source
            .add_record(vec!["Elm".into(), "7".into(), CellValue::Float64(9.5), "x".into()])
            .unwrap();

        let options = AppendOptions::new().with_rename("q", "flow");
        let appended = append_table(&mut dest, &source, &options).unwrap();

        assert_eq!(appended, 1);
        assert_eq!(dest.row_count(), 2);
        assert_eq!(dest.column_count(), 3);
        assert_eq!(dest.get_field_value(1, 0).unwrap(), CellValue::from("Elm"));
        assert!(dest.get_field_value(1, 1).unwrap().is_null());
        assert_eq!(dest.get_field_value(1, 2).unwrap(), CellValue::Float64(9.5));
        assert_eq!(observer.at_least(Level::Warning).len(), 1);
        assert_eq!(dest.column(1).unwrap().value_type, ValueType::Int32);
    }

    #[test]
    fn test_append_column_globs() {
        let mut dest = Table::new(vec![Column::string("a_name", 5), Column::string("b_name", 5)]);
        let mut source = Table::new(vec![Column::string("a_name", 5), Column::string("b_name", 5)]);
        source.add_record(vec!["x".into(), "y".into()]).unwrap();
        append_table(&mut dest, &source, &AppendOptions::new().with_columns(vec!["A_*".into()])).unwrap();
        assert_eq!(dest.get_field_value(0, 0).unwrap(), CellValue::from("x"));
        assert!(dest.get_field_value(0, 1).unwrap().is_null());
    }
}
