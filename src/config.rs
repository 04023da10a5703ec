//! Read and write options for the table codecs

use indexmap::IndexMap;

use crate::model::ValueType;

/// How the first non-comment line of a delimited file is treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderMode {
    /// The line is a header iff its first token starts with a quote
    #[default]
    Auto,
    Present,
    Absent,
}

impl std::str::FromStr for HeaderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(HeaderMode::Auto),
            "present" | "yes" => Ok(HeaderMode::Present),
            "absent" | "no" => Ok(HeaderMode::Absent),
            _ => Err(format!("Unknown header mode: {}", s)),
        }
    }
}

/// Options for reading delimited text
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Lines starting with this prefix are kept as table comments; empty disables
    pub comment_prefix: String,
    pub header: HeaderMode,
    /// Lines skipped before anything else is read
    pub skip_lines: usize,
    /// Maximum number of data rows to read
    pub max_rows: Option<usize>,
    pub delimiter: u8,
    /// Treat a run of delimiters as one
    pub merge_delimiters: bool,
    pub trim_leading: bool,
    pub trim_trailing: bool,
    /// Infer numeric column types; otherwise every column is text
    pub infer_types: bool,
    /// Column types forced by the caller, keyed by (case-insensitive) column name
    pub column_types: IndexMap<String, ValueType>,
    /// Text read as a floating NaN
    pub nan_literal: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            comment_prefix: "#".to_string(),
            header: HeaderMode::Auto,
            skip_lines: 0,
            max_rows: None,
            delimiter: b',',
            merge_delimiters: false,
            trim_leading: true,
            trim_trailing: true,
            infer_types: true,
            column_types: IndexMap::new(),
            nan_literal: "NaN".to_string(),
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header(mut self, header: HeaderMode) -> Self {
        self.header = header;
        self
    }

    pub fn with_comment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.comment_prefix = prefix.into();
        self
    }

    pub fn with_skip_lines(mut self, lines: usize) -> Self {
        self.skip_lines = lines;
        self
    }

    pub fn with_max_rows(mut self, rows: usize) -> Self {
        self.max_rows = Some(rows);
        self
    }

    pub fn with_merge_delimiters(mut self, merge: bool) -> Self {
        self.merge_delimiters = merge;
        self
    }

    pub fn with_trim(mut self, leading: bool, trailing: bool) -> Self {
        self.trim_leading = leading;
        self.trim_trailing = trailing;
        self
    }

    /// Read every column as text
    pub fn all_text(mut self) -> Self {
        self.infer_types = false;
        self
    }

    pub fn with_column_type(mut self, column: impl Into<String>, value_type: ValueType) -> Self {
        self.column_types.insert(column.into(), value_type);
        self
    }

    pub fn with_nan_literal(mut self, literal: impl Into<String>) -> Self {
        self.nan_literal = literal.into();
        self
    }

    /// Caller override for a column, matched case-insensitively
    pub fn column_type(&self, column: &str) -> Option<&ValueType> {
        let lower = column.to_lowercase();
        self.column_types
            .iter()
            .find(|(name, _)| name.to_lowercase() == lower)
            .map(|(_, t)| t)
    }
}

/// Options for writing delimited text
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub delimiter: u8,
    /// Quote every cell, not only text cells and those that need it
    pub always_quote: bool,
    /// Text written for a NaN float
    pub nan_literal: String,
    /// Replacement for line breaks embedded in cell text
    pub newline_replacement: Option<String>,
    /// Write the table comments before the header, prefixed by this
    pub comment_prefix: Option<String>,
    pub line_terminator: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            always_quote: false,
            nan_literal: "NaN".to_string(),
            newline_replacement: None,
            comment_prefix: None,
            line_terminator: "\n".to_string(),
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_always_quote(mut self, always: bool) -> Self {
        self.always_quote = always;
        self
    }

    pub fn with_nan_literal(mut self, literal: impl Into<String>) -> Self {
        self.nan_literal = literal.into();
        self
    }

    pub fn with_newline_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.newline_replacement = Some(replacement.into());
        self
    }

    pub fn with_comments(mut self, prefix: impl Into<String>) -> Self {
        self.comment_prefix = Some(prefix.into());
        self
    }

    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }
}

/// How a DBF file is read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DbfReadMode {
    /// Read every record into memory
    #[default]
    Eager,
    /// Keep the file open and seek for each cell read
    OnTheFly,
}

/// Options for reading fixed-width positional text
#[derive(Debug, Clone, Default)]
pub struct FixedWidthOptions {
    /// Column layout, e.g. `A10, I5, 2X, F8.3`
    pub format: String,
    /// Names for the non-filler columns; missing names become `Column<n>`
    pub names: Vec<String>,
    pub skip_lines: usize,
    pub comment_prefix: Option<String>,
}

impl FixedWidthOptions {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Default::default()
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn with_skip_lines(mut self, lines: usize) -> Self {
        self.skip_lines = lines;
        self
    }

    pub fn with_comment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.comment_prefix = Some(prefix.into());
        self
    }
}
