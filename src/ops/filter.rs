//! Glob patterns and row filters

use regex::{Regex, RegexBuilder};

use crate::error::{Result, TableError};
use crate::model::Table;

/// Case-insensitive `*`-wildcard pattern
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = RegexBuilder::new(&format!("^{}$", body))
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| TableError::InvalidArgument(format!("bad pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// A glob applied to the formatted values of one column
#[derive(Debug, Clone)]
pub struct ValueFilter {
    pub column: String,
    pub pattern: String,
}

impl ValueFilter {
    pub fn new(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            pattern: pattern.into(),
        }
    }
}

/// Include/exclude value filters for selecting rows
///
/// A row passes when, for every column named by an include filter, at least
/// one of that column's include patterns matches, and no exclude pattern matches.
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    pub include: Vec<ValueFilter>,
    pub exclude: Vec<ValueFilter>,
}

impl RowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.include.push(ValueFilter::new(column, pattern));
        self
    }

    pub fn exclude(mut self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.exclude.push(ValueFilter::new(column, pattern));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Resolve column names against `table`; fails fast on an unknown column
    pub fn compile(&self, table: &Table) -> Result<CompiledFilter> {
        let resolve = |filters: &[ValueFilter]| -> Result<Vec<(usize, GlobPattern)>> {
            filters
                .iter()
                .map(|f| Ok((table.field_index(&f.column)?, GlobPattern::new(&f.pattern)?)))
                .collect()
        };
        Ok(CompiledFilter {
            include: resolve(&self.include)?,
            exclude: resolve(&self.exclude)?,
        })
    }
}

/// A [`RowFilter`] bound to one table's column indices
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
    include: Vec<(usize, GlobPattern)>,
    exclude: Vec<(usize, GlobPattern)>,
}

impl CompiledFilter {
    pub fn accepts(&self, table: &Table, row: usize) -> Result<bool> {
        let mut include_columns: Vec<usize> = self.include.iter().map(|(c, _)| *c).collect();
        include_columns.sort_unstable();
        include_columns.dedup();
        for column in include_columns {
            let text = table.formatted_value(row, column)?;
            let any = self
                .include
                .iter()
                .filter(|(c, _)| *c == column)
                .any(|(_, glob)| glob.matches(&text));
            if !any {
                return Ok(false);
            }
        }
        for (column, glob) in &self.exclude {
            if glob.matches(&table.formatted_value(row, *column)?) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
