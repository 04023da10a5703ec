//! Cell-by-cell comparison of two tables

use crate::error::Result;
use crate::model::{CellValue, Column, Table};

const ROUTINE: &str = "compare_tables";

/// How columns of the two tables are paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnPairing {
    /// Case-insensitive column name
    #[default]
    ByName,
    ByPosition,
}

#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    pub pairing: ColumnPairing,
    /// Largest absolute difference tolerated between floating values
    pub tolerance: Option<f64>,
    pub ignore_case: bool,
}

impl CompareOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pairing(mut self, pairing: ColumnPairing) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }
}

/// Result of comparing one pair of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMatch {
    Equal,
    /// Formatted text differs but the numbers are within tolerance
    Tolerated,
    Different,
}

/// Cell comparator with configurable options
#[derive(Debug, Clone, Default)]
pub struct CellComparator {
    ignore_case: bool,
    numeric_tolerance: Option<f64>,
}

impl CellComparator {
    pub fn new(ignore_case: bool, numeric_tolerance: Option<f64>) -> Self {
        Self {
            ignore_case,
            numeric_tolerance,
        }
    }

    /// Compare two formatted cells. `floating` enables the numeric tolerance.
    pub fn compare(&self, a: &CellValue, a_text: &str, b: &CellValue, b_text: &str, floating: bool) -> CellMatch {
        let same_text = if self.ignore_case {
            a_text.to_lowercase() == b_text.to_lowercase()
        } else {
            a_text == b_text
        };
        if same_text {
            return CellMatch::Equal;
        }
        match self.numeric_tolerance {
            Some(tolerance) if floating && a.as_f64().is_some() && a.equals_with_tolerance(b, tolerance) => {
                CellMatch::Tolerated
            }
            _ => CellMatch::Different,
        }
    }
}

/// Same-shaped text table of compared cells plus a difference matrix
#[derive(Debug, Clone)]
pub struct Comparison {
    /// String columns named after the first table's columns
    pub table: Table,
    /// `differences[row][column]` is true where the cells differ
    pub differences: Vec<Vec<bool>>,
}

impl Comparison {
    pub fn difference_count(&self) -> usize {
        self.differences.iter().flatten().filter(|&&d| d).count()
    }

    pub fn has_differences(&self) -> bool {
        self.differences.iter().flatten().any(|&d| d)
    }
}

fn pair_columns(a: &Table, b: &Table, pairing: ColumnPairing) -> Vec<(usize, Option<usize>)> {
    (0..a.column_count())
        .map(|i| {
            let partner = match pairing {
                ColumnPairing::ByName => b.column_index(&a.columns()[i].name),
                ColumnPairing::ByPosition => (i < b.column_count()).then_some(i),
            };
            (i, partner)
        })
        .collect()
}

fn read_cell(table: &Table, row: usize, column: Option<usize>) -> Result<Option<(CellValue, String)>> {
    match column {
        Some(col) if row < table.row_count() => {
            let value = table.get_field_value(row, col)?;
            let text = table.columns()[col].format_value(&value)?;
            Ok(Some((value, text)))
        }
        _ => Ok(None),
    }
}

/// Compare `a` against `b`, formatting every cell through its own column.
///
/// Equal cells pass through; mismatches render `"v1 / v2"`, or `"v1 ~/~ v2"`
/// when a floating mismatch is within tolerance. Cells with no counterpart
/// (unpaired column or extra row) count as differences.
pub fn compare_tables(a: &Table, b: &Table, options: &CompareOptions) -> Result<Comparison> {
    let comparator = CellComparator::new(options.ignore_case, options.tolerance);
    let pairs = pair_columns(a, b, options.pairing);

    let columns = a
        .columns()
        .iter()
        .map(|c| Column::new(c.name.clone(), crate::model::ValueType::String))
        .collect();
    let mut table = Table::new(columns)
        .with_identifier(format!("{} vs {}", a.identifier(), b.identifier()))
        .with_logger(a.logger().clone());

    let rows = a.row_count().max(b.row_count());
    let mut differences = Vec::with_capacity(rows);
    for row in 0..rows {
        let mut cells = Vec::with_capacity(pairs.len());
        let mut flags = Vec::with_capacity(pairs.len());
        for &(ca, cb) in &pairs {
            let left = read_cell(a, row, Some(ca))?;
            let right = read_cell(b, row, cb)?;
            let (text, differs) = match (left, right) {
                (Some((va, ta)), Some((vb, tb))) => {
                    let floating = a.columns()[ca].value_type.is_float()
                        || cb.is_some_and(|c| b.columns()[c].value_type.is_float());
                    match comparator.compare(&va, &ta, &vb, &tb, floating) {
                        CellMatch::Equal => (ta, false),
                        CellMatch::Tolerated => (format!("{} ~/~ {}", ta, tb), false),
                        CellMatch::Different => (format!("{} / {}", ta, tb), true),
                    }
                }
                (Some((_, ta)), None) => (format!("{} / ", ta), true),
                (None, Some((_, tb))) => (format!(" / {}", tb), true),
                (None, None) => (String::new(), cb.is_none()),
            };
            cells.push(CellValue::String(text));
            flags.push(differs);
        }
        table.add_record(cells)?;
        differences.push(flags);
    }

    let comparison = Comparison { table, differences };
    a.logger().debug(
        ROUTINE,
        format!("{} differing cells over {} rows", comparison.difference_count(), rows),
    );
    Ok(comparison)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauges() -> Table {
        let mut table = Table::new(vec![Column::string("site", 8), Column::double("flow", 2)]);
        table.add_record(vec!["Ash".into(), CellValue::Float64(1.0)]).unwrap();
        table.add_record(vec!["Birch".into(), CellValue::Float64(2.0)]).unwrap();
        table
    }

    #[test]
    fn test_identical_tables_have_no_differences() {
        let a = gauges();
        let comparison = compare_tables(&a, &a.clone(), &CompareOptions::new()).unwrap();
        assert_eq!(comparison.difference_count(), 0);
        assert_eq!(comparison.table.row_count(), 2);
        assert_eq!(comparison.table.get_field_value(1, 1).unwrap(), CellValue::from("2.00"));
    }

    #[test]
    fn test_mismatch_and_tolerance_rendering() {
        let a = gauges();
        let mut b = gauges();
        b.set_field_value(0, 1, CellValue::Float64(1.004), false).unwrap();
        b.set_field_value(1, 0, "Cedar".into(), false).unwrap();

        let strict = compare_tables(&a, &b, &CompareOptions::new()).unwrap();
        // 1.004 formats as "1.00" through precision 2
        assert_eq!(strict.difference_count(), 1);
        assert_eq!(strict.table.get_field_value(1, 0).unwrap(), CellValue::from("Birch / Cedar"));
        assert_eq!(strict.differences[1], vec![true, false]);

        b.set_field_value(0, 1, CellValue::Float64(1.04), false).unwrap();
        let tolerant = compare_tables(&a, &b, &CompareOptions::new().with_tolerance(0.05)).unwrap();
        assert_eq!(tolerant.table.get_field_value(0, 1).unwrap(), CellValue::from("1.00 ~/~ 1.04"));
        assert!(!tolerant.differences[0][1]);
        assert_eq!(tolerant.difference_count(), 1);
    }

    #[test]
    fn test_positional_pairing_and_missing_rows() {
        let a = gauges();
        let mut b = Table::new(vec![Column::string("name", 8), Column::double("q", 2)]);
        b.add_record(vec!["Ash".into(), CellValue::Float64(1.0)]).unwrap();

        let by_name = compare_tables(&a, &b, &CompareOptions::new()).unwrap();
        assert!(by_name.differences[0].iter().all(|&d| d));

        let by_position = compare_tables(&a, &b, &CompareOptions::new().with_pairing(ColumnPairing::ByPosition)).unwrap();
        assert_eq!(by_position.differences[0], vec![false, false]);
        assert_eq!(by_position.differences[1], vec![true, true]);
        assert_eq!(by_position.table.get_field_value(1, 0).unwrap(), CellValue::from("Birch / "));
    }

    #[test]
    fn test_comparator_ignore_case() {
        let comparator = CellComparator::new(true, None);
        let a = CellValue::from("Ash");
        let b = CellValue::from("ASH");
        assert_eq!(comparator.compare(&a, "Ash", &b, "ASH", false), CellMatch::Equal);
        assert_eq!(CellComparator::default().compare(&a, "Ash", &b, "ASH", false), CellMatch::Different);
    }
}
