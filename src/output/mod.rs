//! Writers for tables

mod dbf;
mod delimited;
mod terminal;

use std::io::Write;
use std::path::Path;

use crate::config::WriteOptions;
use crate::error::{Result, TableError};
use crate::model::Table;

pub use dbf::{DbfWriter, DEFAULT_FIELD_WIDTH};
pub use delimited::DelimitedWriter;
pub use terminal::TerminalOutput;

/// Trait for table writers
pub trait TableWriter {
    /// Serialize a table to a writer
    fn write_to(&self, table: &Table, writer: &mut dyn Write) -> Result<()>;

    /// Serialize a table to a file
    fn write(&self, table: &Table, path: &Path) -> Result<()>;

    /// Check if this writer produces the given file extension
    fn supports_extension(&self, ext: &str) -> bool;
}

/// Factory for choosing a writer by file extension
pub struct WriterFactory {
    writers: Vec<Box<dyn TableWriter>>,
}

impl Default for WriterFactory {
    fn default() -> Self {
        Self::new(WriteOptions::default())
    }
}

impl WriterFactory {
    pub fn new(options: WriteOptions) -> Self {
        Self {
            writers: vec![
                Box::new(DelimitedWriter::new(options)),
                Box::new(DbfWriter::new()),
            ],
        }
    }

    pub fn get_writer(&self, path: &Path) -> Result<&dyn TableWriter> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        self.writers
            .iter()
            .find(|w| w.supports_extension(&ext))
            .map(|w| w.as_ref())
            .ok_or_else(|| TableError::InvalidArgument(format!("unsupported output format: {}", ext)))
    }

    /// Write a table using the writer for the path's extension
    pub fn write(&self, table: &Table, path: &Path) -> Result<()> {
        self.get_writer(path)?.write(table, path)
    }
}
