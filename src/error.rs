//! Error taxonomy for table operations

use thiserror::Error;

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// Errors raised by the table engine, its codecs and its operators.
#[derive(Debug, Error)]
pub enum TableError {
    /// Record length differs from the column count, or a required key column is missing
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Column name or row index does not exist
    #[error("not found: {0}")]
    NotFound(String),

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    /// A cell value cannot be stored in (or formatted by) a column of another type
    #[error("type mismatch in column '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    /// Unparseable text or an illegal binary layout
    #[error("format error: {0}")]
    Format(String),

    #[error("unsupported column type {value_type} for column '{column}'")]
    UnsupportedType { column: String, value_type: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal error of a bulk operator, raised after the full pass
    #[error("{count} row problem(s), first: {}", problems.first().map(String::as_str).unwrap_or(""))]
    RowProblems { count: usize, problems: Vec<String> },
}

impl TableError {
    pub fn not_found(what: impl Into<String>) -> Self {
        TableError::NotFound(what.into())
    }

    pub fn schema(what: impl Into<String>) -> Self {
        TableError::SchemaMismatch(what.into())
    }

    pub fn format(what: impl Into<String>) -> Self {
        TableError::Format(what.into())
    }

    /// Whether this error marks a missing column or row
    pub fn is_not_found(&self) -> bool {
        matches!(self, TableError::NotFound(_))
    }
}
