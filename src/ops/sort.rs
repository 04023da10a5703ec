//! Stable hierarchical multi-key sort

use std::cmp::Ordering;

use crate::error::{Result, TableError};
use crate::model::{CellValue, Table, ValueType};

const ROUTINE: &str = "sort_table";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Descending,
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = TableError;

    /// `name`, `name:asc` or `name:desc`
    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once(':') {
            Some((name, order)) if order.eq_ignore_ascii_case("desc") => Ok(Self::descending(name)),
            Some((name, order)) if order.eq_ignore_ascii_case("asc") => Ok(Self::ascending(name)),
            Some((_, order)) => Err(TableError::InvalidArgument(format!("unknown sort order '{}'", order))),
            None => Ok(Self::ascending(s)),
        }
    }
}

fn sortable(value_type: &ValueType) -> bool {
    !matches!(value_type, ValueType::Boolean | ValueType::Array(_))
}

/// Compute the permutation that sorts `table` by `keys`.
///
/// Output row `i` is original row `result[i]`. Rows are fully sorted by the
/// first key; each later key only reorders runs that tie on all earlier keys.
pub fn sort_permutation(table: &Table, keys: &[SortKey]) -> Result<Vec<usize>> {
    let mut columns = Vec::with_capacity(keys.len());
    for key in keys {
        let index = table.column_index(&key.column).ok_or_else(|| {
            TableError::schema(format!(
                "sort key '{}' is not a column of table '{}'",
                key.column,
                table.identifier()
            ))
        })?;
        let value_type = &table.columns()[index].value_type;
        if !sortable(value_type) {
            return Err(TableError::InvalidArgument(format!(
                "cannot sort on column '{}' of type {}",
                key.column, value_type
            )));
        }
        columns.push((index, key.order));
    }

    let rows = table.row_count();
    let mut order: Vec<usize> = (0..rows).collect();
    if columns.is_empty() {
        return Ok(order);
    }

    // Column-major copy of the key cells so comparisons stay cheap
    let mut values: Vec<Vec<CellValue>> = Vec::with_capacity(columns.len());
    for &(column, _) in &columns {
        values.push((0..rows).map(|r| table.get_field_value(r, column)).collect::<Result<_>>()?);
    }
    let compare = |level: usize, a: usize, b: usize| -> Ordering {
        let ordering = values[level][a].sort_cmp(&values[level][b]);
        match columns[level].1 {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    };

    order.sort_by(|&a, &b| compare(0, a, b));
    for level in 1..columns.len() {
        let mut start = 0;
        while start < rows {
            let mut end = start + 1;
            while end < rows && (0..level).all(|k| compare(k, order[start], order[end]) == Ordering::Equal) {
                end += 1;
            }
            if end - start > 1 {
                order[start..end].sort_by(|&a, &b| compare(level, a, b));
            }
            start = end;
        }
    }
    Ok(order)
}

/// Sort `table` in place and return the permutation applied
pub fn sort_table(table: &mut Table, keys: &[SortKey]) -> Result<Vec<usize>> {
    let order = sort_permutation(table, keys)?;
    table.reorder_rows(&order)?;
    table.logger().debug(ROUTINE, format!("sorted {} rows on {} keys", order.len(), keys.len()));
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;
    use chrono::NaiveDate;

    fn sample() -> Table {
        let mut table = Table::new(vec![
            Column::string("site", 8),
            Column::integer("year"),
            Column::double("flow", 1),
        ]);
        let rows: Vec<(&str, i32, f64)> = vec![
            ("b", 2001, 1.0),
            ("a", 2002, 2.0),
            ("b", 2000, 3.0),
            ("a", 2002, 4.0),
            ("a", 2001, 5.0),
        ];
        for (site, year, flow) in rows {
            table
                .add_record(vec![site.into(), CellValue::Int32(year), CellValue::Float64(flow)])
                .unwrap();
        }
        table
    }

    #[test]
    fn test_two_keys_with_stable_ties() {
        let table = sample();
        let order = sort_permutation(&table, &[SortKey::ascending("site"), SortKey::descending("year")]).unwrap();
        // ties on (a, 2002) keep their original relative order
        assert_eq!(order, vec![1, 3, 4, 0, 2]);
    }

    #[test]
    fn test_sort_table_applies_permutation() {
        let mut table = sample();
        let order = sort_table(&mut table, &[SortKey::descending("flow")]).unwrap();
        assert_eq!(order, vec![4, 3, 2, 1, 0]);
        assert_eq!(table.get_field_value(0, 2).unwrap(), CellValue::Float64(5.0));
        assert_eq!(table.row_count(), 5);
    }

    #[test]
    fn test_nulls_first_and_nan_last() {
        let mut table = Table::new(vec![Column::double("x", 1)]);
        for v in [CellValue::Float64(f64::NAN), CellValue::Float64(2.0), CellValue::Null, CellValue::Float64(-1.0)] {
            table.add_record(vec![v]).unwrap();
        }
        let order = sort_permutation(&table, &[SortKey::ascending("x")]).unwrap();
        assert_eq!(order, vec![2, 3, 1, 0]);
    }

    #[test]
    fn test_strings_are_case_sensitive_ordinal() {
        let mut table = Table::new(vec![Column::string("s", 4)]);
        for s in ["b", "B", "a"] {
            table.add_record(vec![s.into()]).unwrap();
        }
        assert_eq!(sort_permutation(&table, &[SortKey::ascending("s")]).unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn test_dates_sort() {
        let mut table = Table::new(vec![Column::new("d", ValueType::Date)]);
        for day in [3, 1, 2] {
            table
                .add_record(vec![CellValue::Date(NaiveDate::from_ymd_opt(2020, 1, day).unwrap())])
                .unwrap();
        }
        assert_eq!(sort_permutation(&table, &[SortKey::ascending("d")]).unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn test_bad_keys() {
        let table = sample();
        let err = sort_permutation(&table, &[SortKey::ascending("nope")]).unwrap_err();
        assert!(matches!(err, TableError::SchemaMismatch(_)));

        let mut flags = Table::new(vec![Column::new("flag", ValueType::Boolean)]);
        flags.add_record(vec![CellValue::Bool(true)]).unwrap();
        assert!(sort_permutation(&flags, &[SortKey::ascending("flag")]).is_err());
    }

    #[test]
    fn test_parse_sort_key() {
        assert_eq!("flow:desc".parse::<SortKey>().unwrap(), SortKey::descending("flow"));
        assert_eq!("flow".parse::<SortKey>().unwrap(), SortKey::ascending("flow"));
        assert!("flow:up".parse::<SortKey>().is_err());
    }
}
