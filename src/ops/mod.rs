//! Query and transform operators over tables
//!
//! Operators fail fast on pre-conditions (unknown key column, bad record
//! length). Per-row problems are collected and reported together after the
//! whole pass, so rows that succeeded stay in the output.

mod append;
mod arithmetic;
mod compare;
mod copy;
mod filter;
mod format;
mod join;
mod sort;
mod strings;

use indexmap::IndexMap;

use crate::error::{Result, TableError};
use crate::logger::Logger;

pub use append::{append_table, AppendOptions};
pub use arithmetic::{apply_arithmetic, ArithmeticOp, ArithmeticOptions, Operand};
pub use compare::{compare_tables, CellComparator, CellMatch, ColumnPairing, CompareOptions, Comparison};
pub use copy::{copy_into, copy_table, CopyOptions};
pub use filter::{CompiledFilter, GlobPattern, RowFilter, ValueFilter};
pub use format::{format_columns, FormatOptions};
pub use join::{join_tables, JoinMode, JoinOptions, JoinSummary, MatchPolicy};
pub use sort::{sort_permutation, sort_table, SortKey, SortOrder};
pub use strings::{apply_string_operation, StringOperation, StringOptions};

/// Per-row problems gathered during a bulk pass
#[derive(Debug, Default)]
pub struct Problems {
    messages: Vec<String>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: usize, message: impl std::fmt::Display) {
        self.messages.push(format!("row {}: {}", row + 1, message));
    }

    pub fn push_general(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Log the problems and turn them into the operator's terminal error
    pub fn finish(self, routine: &str, logger: &Logger) -> Result<()> {
        if self.messages.is_empty() {
            return Ok(());
        }
        for message in &self.messages {
            logger.warn(routine, message);
        }
        Err(TableError::RowProblems {
            count: self.messages.len(),
            problems: self.messages,
        })
    }
}

/// Output name for `name` under a rename map matched case-insensitively
pub(crate) fn renamed(rename: &IndexMap<String, String>, name: &str) -> String {
    let lower = name.to_lowercase();
    rename
        .iter()
        .find(|(from, _)| from.to_lowercase() == lower)
        .map(|(_, to)| to.clone())
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problems_finish() {
        assert!(Problems::new().finish("op", &Logger::new()).is_ok());

        let mut problems = Problems::new();
        problems.push(0, "bad");
        problems.push(4, "worse");
        match problems.finish("op", &Logger::new()) {
            Err(TableError::RowProblems { count, problems }) => {
                assert_eq!(count, 2);
                assert_eq!(problems[0], "row 1: bad");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_renamed() {
        let mut map = IndexMap::new();
        map.insert("Flow".to_string(), "discharge".to_string());
        assert_eq!(renamed(&map, "FLOW"), "discharge");
        assert_eq!(renamed(&map, "stage"), "stage");
    }
}
