//! Key-based join of a secondary table into a primary table

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::error::{Result, TableError};
use crate::model::{CellValue, Column, KeyBuilder, Table};

use super::{renamed, Problems};

const ROUTINE: &str = "join_tables";

/// What to do when a primary row matches more than one secondary row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Later matches overwrite earlier ones
    #[default]
    UseLastMatch,
    /// The n-th match (n >= 2) writes into `<name>_n` columns
    NumberColumns,
}

/// Whether unmatched secondary rows are appended to the primary table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMode {
    #[default]
    MatchOnly,
    /// Append unmatched secondary rows with keys and joined columns filled.
    /// Under [`MatchPolicy::NumberColumns`] only the base columns are filled.
    AlwaysJoin,
}

#[derive(Debug, Clone, Default)]
pub struct JoinOptions {
    pub primary_keys: Vec<String>,
    /// Key columns in the secondary table; empty reuses `primary_keys`
    pub secondary_keys: Vec<String>,
    /// Secondary columns to bring over; empty takes every non-key column
    pub columns: Vec<String>,
    /// Secondary name to primary name
    pub rename: IndexMap<String, String>,
    pub policy: MatchPolicy,
    pub mode: JoinMode,
}

impl JoinOptions {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            primary_keys: keys,
            ..Default::default()
        }
    }

    pub fn with_secondary_keys(mut self, keys: Vec<String>) -> Self {
        self.secondary_keys = keys;
        self
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.insert(from.into(), to.into());
        self
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_mode(mut self, mode: JoinMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Row counts from a join
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinSummary {
    /// Primary rows that found at least one secondary match
    pub matched_rows: usize,
    /// Primary rows with no match
    pub unmatched_rows: usize,
    /// Secondary rows appended under [`JoinMode::AlwaysJoin`]
    pub appended_rows: usize,
}

fn resolve_keys(table: &Table, names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            table.column_index(name).ok_or_else(|| {
                TableError::schema(format!(
                    "join key '{}' is not a column of table '{}'",
                    name,
                    table.identifier()
                ))
            })
        })
        .collect()
}

/// Destination column for one joined secondary column, created on first use
struct Target {
    source: usize,
    template: Column,
    base: Option<usize>,
    numbered: FxHashMap<usize, usize>,
}

impl Target {
    fn ensure(slot: &mut Option<usize>, primary: &mut Table, template: &Column, name: &str) -> Result<usize> {
        if let Some(index) = *slot {
            return Ok(index);
        }
        let index = match primary.column_index(name) {
            Some(index) => index,
            None => {
                let mut column = template.clone();
                column.name = name.to_string();
                primary.add_field(column, CellValue::Null, None)?
            }
        };
        *slot = Some(index);
        Ok(index)
    }

    fn base_column(&mut self, primary: &mut Table) -> Result<usize> {
        let name = self.template.name.clone();
        Self::ensure(&mut self.base, primary, &self.template, &name)
    }

    /// Column for the `nth` (1-based) match of a primary row
    fn column_for_match(&mut self, primary: &mut Table, nth: usize, policy: MatchPolicy) -> Result<usize> {
        if nth <= 1 || policy == MatchPolicy::UseLastMatch {
            return self.base_column(primary);
        }
        let name = format!("{}_{}", self.template.name, nth);
        let mut slot = self.numbered.get(&nth).copied();
        let index = Self::ensure(&mut slot, primary, &self.template, &name)?;
        self.numbered.insert(nth, index);
        Ok(index)
    }
}

/// Join `secondary` into `primary` on equal keys (strings compare
/// case-insensitively; null or blank keys never match).
pub fn join_tables(primary: &mut Table, secondary: &Table, options: &JoinOptions) -> Result<JoinSummary> {
    if options.primary_keys.is_empty() {
        return Err(TableError::InvalidArgument("join needs at least one key column".into()));
    }
    let secondary_names = if options.secondary_keys.is_empty() {
        &options.primary_keys
    } else {
        &options.secondary_keys
    };
    if secondary_names.len() != options.primary_keys.len() {
        return Err(TableError::schema(format!(
            "{} primary keys but {} secondary keys",
            options.primary_keys.len(),
            secondary_names.len()
        )));
    }
    let primary_keys = resolve_keys(primary, &options.primary_keys)?;
    let secondary_keys = resolve_keys(secondary, secondary_names)?;

    let joined: Vec<usize> = if options.columns.is_empty() {
        (0..secondary.column_count())
            .filter(|c| !secondary_keys.contains(c))
            .collect()
    } else {
        options
            .columns
            .iter()
            .map(|name| secondary.field_index(name))
            .collect::<Result<_>>()?
    };
    let mut targets: Vec<Target> = joined
        .into_iter()
        .map(|source| {
            let mut template = secondary.columns()[source].clone();
            template.name = renamed(&options.rename, &template.name);
            Target {
                source,
                template,
                base: None,
                numbered: FxHashMap::default(),
            }
        })
        .collect();

    let logger = primary.logger().clone();
    let index = KeyBuilder::new().with_columns(secondary_keys.clone()).index_rows(secondary)?;
    let primary_builder = KeyBuilder::new().with_columns(primary_keys.clone());
    let mut secondary_matched = vec![false; secondary.row_count()];
    let mut summary = JoinSummary::default();
    let mut problems = Problems::new();

    for row in 0..primary.row_count() {
        let matches: &[usize] = match primary_builder.row_key(primary, row)? {
            Some(key) => index.get(&key).map(Vec::as_slice).unwrap_or(&[]),
            None => &[],
        };
        if matches.is_empty() {
            summary.unmatched_rows += 1;
            continue;
        }
        summary.matched_rows += 1;
        for (n, &srow) in matches.iter().enumerate() {
            secondary_matched[srow] = true;
            for target in targets.iter_mut() {
                let dest = target.column_for_match(primary, n + 1, options.policy)?;
                let result = secondary
                    .get_field_value(srow, target.source)
                    .and_then(|value| primary.set_field_value(row, dest, value, false));
                if let Err(e) = result {
                    problems.push(row, e);
                }
            }
        }
    }

    if options.mode == JoinMode::AlwaysJoin {
        for (srow, _) in secondary_matched.iter().enumerate().filter(|(_, matched)| !**matched) {
            let mut dests = Vec::with_capacity(targets.len());
            for target in targets.iter_mut() {
                dests.push(target.base_column(primary)?);
            }
            let row = primary.row_count();
            primary.add_record(vec![CellValue::Null; primary.column_count()])?;
            let keyed = primary_keys.iter().zip(&secondary_keys).map(|(&p, &s)| (s, p));
            let joined = targets.iter().zip(&dests).map(|(t, &d)| (t.source, d));
            for (source, dest) in keyed.chain(joined) {
                let result = secondary
                    .get_field_value(srow, source)
                    .and_then(|value| primary.set_field_value(row, dest, value, false));
                if let Err(e) = result {
                    problems.push(row, e);
                }
            }
            summary.appended_rows += 1;
        }
    }

    logger.debug(
        ROUTINE,
        format!(
            "{} matched, {} unmatched, {} appended",
            summary.matched_rows, summary.unmatched_rows, summary.appended_rows
        ),
    );
    problems.finish(ROUTINE, &logger)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueType;

    fn sites() -> Table {
        let mut table = Table::new(vec![Column::string("site", 8), Column::integer("zone")]);
        table.add_record(vec!["Ash".into(), CellValue::Int32(1)]).unwrap();
        table.add_record(vec!["birch".into(), CellValue::Int32(2)]).unwrap();
        table.add_record(vec![CellValue::Null, CellValue::Int32(3)]).unwrap();
        table
    }

    fn flows() -> Table {
        let mut table = Table::new(vec![
            Column::string("SITE", 8),
            Column::double("flow", 2).with_width(9),
        ]);
        table.add_record(vec!["ash".into(), CellValue::Float64(1.5)]).unwrap();
        table.add_record(vec!["Birch".into(), CellValue::Float64(2.5)]).unwrap();
        table.add_record(vec!["birch".into(), CellValue::Float64(3.5)]).unwrap();
        table.add_record(vec!["Cedar".into(), CellValue::Float64(4.5)]).unwrap();
        table.add_record(vec![CellValue::Null, CellValue::Float64(9.0)]).unwrap();
        table
    }

    #[test]
    fn test_last_match_wins_and_columns_take_secondary_descriptor() {
        let mut primary = sites();
        let summary = join_tables(&mut primary, &flows(), &JoinOptions::new(vec!["site".into()])).unwrap();

        assert_eq!(summary.matched_rows, 2);
        assert_eq!(summary.unmatched_rows, 1);
        let flow = primary.column_by_name("flow").unwrap();
        assert_eq!(flow.value_type, ValueType::Float64);
        assert_eq!(flow.precision, Some(2));
        assert_eq!(flow.width, Some(9));
        assert_eq!(primary.get_field_value_by_name(0, "flow").unwrap(), CellValue::Float64(1.5));
        assert_eq!(primary.get_field_value_by_name(1, "flow").unwrap(), CellValue::Float64(3.5));
        assert!(primary.get_field_value_by_name(2, "flow").unwrap().is_null());
    }

    #[test]
    fn test_number_columns_policy() {
        let mut primary = sites();
        let options = JoinOptions::new(vec!["site".into()]).with_policy(MatchPolicy::NumberColumns);
        join_tables(&mut primary, &flows(), &options).unwrap();

        assert_eq!(primary.column_count(), 4);
        assert_eq!(primary.get_field_value_by_name(1, "flow").unwrap(), CellValue::Float64(2.5));
        assert_eq!(primary.get_field_value_by_name(1, "flow_2").unwrap(), CellValue::Float64(3.5));
        assert!(primary.get_field_value_by_name(0, "flow_2").unwrap().is_null());
    }

    #[test]
    fn test_always_join_appends_unmatched_rows() {
        let mut primary = sites();
        let options = JoinOptions::new(vec!["site".into()]).with_mode(JoinMode::AlwaysJoin);
        let summary = join_tables(&mut primary, &flows(), &options).unwrap();

        // Cedar and the null-keyed row never match
        assert_eq!(summary.appended_rows, 2);
        assert_eq!(primary.row_count(), 5);
        assert_eq!(primary.get_field_value(3, 0).unwrap(), CellValue::from("Cedar"));
        assert!(primary.get_field_value(3, 1).unwrap().is_null());
        assert_eq!(primary.get_field_value_by_name(3, "flow").unwrap(), CellValue::Float64(4.5));
    }

    #[test]
    fn test_always_join_with_numbered_columns_fills_base_only() {
        let mut primary = sites();
        let options = JoinOptions::new(vec!["site".into()])
            .with_policy(MatchPolicy::NumberColumns)
            .with_mode(JoinMode::AlwaysJoin);
        let summary = join_tables(&mut primary, &flows(), &options).unwrap();

        assert_eq!(summary.appended_rows, 2);
        assert_eq!(primary.column_count(), 4);
        assert_eq!(primary.get_field_value_by_name(1, "flow_2").unwrap(), CellValue::Float64(3.5));
        assert_eq!(primary.get_field_value_by_name(3, "site").unwrap(), CellValue::from("Cedar"));
        assert_eq!(primary.get_field_value_by_name(3, "flow").unwrap(), CellValue::Float64(4.5));
        assert!(primary.get_field_value_by_name(3, "flow_2").unwrap().is_null());
        assert_eq!(primary.get_field_value_by_name(4, "flow").unwrap(), CellValue::Float64(9.0));
    }

    #[test]
    fn test_join_with_itself_reproduces_columns() {
        let mut table = flows();
        table.delete_record(2).unwrap();
        table.delete_record(3).unwrap();
        let original = table.clone();
        join_tables(&mut table, &original, &JoinOptions::new(vec!["site".into()])).unwrap();
        assert_eq!(table.column_count(), original.column_count());
        assert_eq!(table.rows(), original.rows());
    }

    #[test]
    fn test_missing_key_is_schema_mismatch() {
        let mut primary = sites();
        let err = join_tables(&mut primary, &flows(), &JoinOptions::new(vec!["zone".into()])).unwrap_err();
        assert!(matches!(err, TableError::SchemaMismatch(_)));
        assert_eq!(primary.column_count(), 2);
    }

    #[test]
    fn test_renamed_and_selected_columns() {
        let mut primary = sites();
        let options = JoinOptions::new(vec!["site".into()])
            .with_columns(vec!["flow".into()])
            .with_rename("flow", "discharge");
        join_tables(&mut primary, &flows(), &options).unwrap();
        assert!(primary.column_index("discharge").is_some());
        assert!(primary.column_index("flow").is_none());
    }
}
