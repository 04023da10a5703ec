//! Parser layer for reading tabular files

pub mod dbf;
mod delimited;
mod fixed;
mod infer;

use std::path::Path;

use crate::config::{DbfReadMode, ParseOptions};
use crate::error::{Result, TableError};
use crate::logger::Logger;
use crate::model::Table;

pub use self::dbf::{read_dbf, DbfParser};
pub use self::delimited::{parse_text, DelimitedParser};
pub use self::fixed::{parse_fixed_text, parse_format, read_fixed_width, FieldSpec};
pub use self::infer::{infer_columns, ColumnStats};

/// Trait for parsing tabular data files
pub trait Parser {
    /// Parse a file and return a Table
    fn parse(&self, path: &Path, logger: &Logger) -> Result<Table>;

    /// Check if this parser can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool;
}

/// Factory for creating parsers based on file extension
pub struct ParserFactory {
    parsers: Vec<Box<dyn Parser>>,
}

impl Default for ParserFactory {
    fn default() -> Self {
        Self::new(ParseOptions::default(), DbfReadMode::Eager)
    }
}

impl ParserFactory {
    /// Create a factory with the delimited and DBF parsers
    pub fn new(options: ParseOptions, dbf_mode: DbfReadMode) -> Self {
        let tab_options = options.clone().with_delimiter(b'\t');
        Self {
            parsers: vec![
                Box::new(TabParser(DelimitedParser::new(tab_options))),
                Box::new(DelimitedParser::new(options)),
                Box::new(DbfParser::new(dbf_mode)),
            ],
        }
    }

    /// Get a parser for the given file path
    pub fn get_parser(&self, path: &Path) -> Result<&dyn Parser> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        for parser in &self.parsers {
            if parser.supports_extension(&ext) {
                return Ok(parser.as_ref());
            }
        }

        Err(TableError::InvalidArgument(format!(
            "unsupported file format: {}",
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
        )))
    }

    /// Parse a file using the appropriate parser
    pub fn parse(&self, path: &Path, logger: &Logger) -> Result<Table> {
        let parser = self.get_parser(path)?;
        parser.parse(path, logger)
    }
}

/// `.tsv` files are tab-delimited whatever the configured delimiter
struct TabParser(DelimitedParser);

impl Parser for TabParser {
    fn parse(&self, path: &Path, logger: &Logger) -> Result<Table> {
        self.0.parse(path, logger)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        ext.eq_ignore_ascii_case("tsv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selects_by_extension() {
        let factory = ParserFactory::default();
        assert!(factory.get_parser(Path::new("a.csv")).is_ok());
        assert!(factory.get_parser(Path::new("a.DBF")).is_ok());
        assert!(factory.get_parser(Path::new("a.tsv")).is_ok());
        assert!(factory.get_parser(Path::new("a.parquet")).is_err());
    }
}
