//! Delimited text writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::WriteOptions;
use crate::error::{Result, TableError};
use crate::model::{Table, ValueType};

use super::TableWriter;

/// Writer for delimited text files
#[derive(Debug, Clone, Default)]
pub struct DelimitedWriter {
    options: WriteOptions,
}

impl DelimitedWriter {
    pub fn new(options: WriteOptions) -> Self {
        Self { options }
    }

    /// Render a table to delimited text in memory
    pub fn to_text(&self, table: &Table) -> Result<String> {
        let mut buf = Vec::new();
        self.write_to(table, &mut buf)?;
        String::from_utf8(buf).map_err(|e| TableError::format(e.to_string()))
    }

    fn line_writer<W: Write>(&self, writer: W) -> csv::Writer<W> {
        let terminator = match self.options.line_terminator.as_str() {
            "\r\n" => csv::Terminator::CRLF,
            other => csv::Terminator::Any(other.bytes().next().unwrap_or(b'\n')),
        };
        // Quoting is decided per column below, so the csv writer never adds its own
        csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .quote_style(csv::QuoteStyle::Never)
            .terminator(terminator)
            .flexible(true)
            .from_writer(writer)
    }

    fn cell_text(&self, text: &str, quote_column: bool) -> String {
        let mut text = text.to_string();
        if let Some(replacement) = &self.options.newline_replacement {
            text = text
                .replace("\r\n", replacement)
                .replace(['\n', '\r'], replacement);
        }
        let delimiter = self.options.delimiter as char;
        let needs_quotes =
            quote_column || self.options.always_quote || text.contains(delimiter) || text.contains('"');
        if needs_quotes {
            format!("\"{}\"", text.replace('"', "\"\""))
        } else {
            text
        }
    }
}

impl TableWriter for DelimitedWriter {
    fn write_to(&self, table: &Table, writer: &mut dyn Write) -> Result<()> {
        if let Some(prefix) = &self.options.comment_prefix {
            for comment in table.comments() {
                write!(writer, "{}{}{}", prefix, comment, self.options.line_terminator)?;
            }
        }

        let mut out = self.line_writer(writer);
        let csv_err = |e: csv::Error| match e.into_kind() {
            csv::ErrorKind::Io(io) => TableError::Io(io),
            other => TableError::format(format!("{:?}", other)),
        };

        if table.columns().iter().any(|c| !c.name.trim().is_empty()) {
            let header: Vec<String> = table
                .columns()
                .iter()
                .map(|c| format!("\"{}\"", c.name.replace('"', "\"\"")))
                .collect();
            out.write_record(&header).map_err(csv_err)?;
        }

        for row in 0..table.row_count() {
            let mut fields = Vec::with_capacity(table.column_count());
            for (col, column) in table.columns().iter().enumerate() {
                let value = table.get_field_value(row, col)?;
                let text = column.format_with_nan(&value, &self.options.nan_literal)?;
                fields.push(self.cell_text(&text, column.value_type == ValueType::String));
            }
            out.write_record(&fields).map_err(csv_err)?;
        }
        out.flush()?;
        Ok(())
    }

    fn write(&self, table: &Table, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(table, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "csv" | "tsv" | "txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseOptions;
    use crate::logger::Logger;
    use crate::model::{CellValue, Column};
    use crate::parser::parse_text;

    fn sample() -> Table {
        let mut table = Table::new(vec![
            Column::string("name", 20),
            Column::integer("n"),
            Column::double("x", 2),
        ]);
        table
            .add_record(vec!["plain".into(), CellValue::Int32(1), CellValue::Float64(1.0)])
            .unwrap();
        table
            .add_record(vec!["a \"q\", b".into(), CellValue::Null, CellValue::Float64(f64::NAN)])
            .unwrap();
        table
    }

    #[test]
    fn test_quoting_rules() {
        let text = DelimitedWriter::default().to_text(&sample()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "\"name\",\"n\",\"x\"");
        assert_eq!(lines[1], "\"plain\",1,1.00");
        assert_eq!(lines[2], "\"a \"\"q\"\", b\",,NaN");
    }

    #[test]
    fn test_always_quote() {
        let writer = DelimitedWriter::new(WriteOptions::default().with_always_quote(true));
        let text = writer.to_text(&sample()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[1], "\"plain\",\"1\",\"1.00\"");
        assert_eq!(lines[2], "\"a \"\"q\"\", b\",\"\",\"NaN\"");
    }

    #[test]
    fn test_nan_literal_and_newlines() {
        let mut table = sample();
        table.set_field_value(0, 0, "two\nlines".into(), false).unwrap();
        let writer = DelimitedWriter::new(
            WriteOptions::default()
                .with_nan_literal("-999")
                .with_newline_replacement(" "),
        );
        let text = writer.to_text(&table).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("\"two lines\""));
        assert!(text.contains("-999"));
    }

    #[test]
    fn test_header_omitted_when_names_blank() {
        let mut table = Table::new(vec![Column::integer(" ")]);
        table.add_record(vec![CellValue::Int32(4)]).unwrap();
        let text = DelimitedWriter::default().to_text(&table).unwrap();
        assert_eq!(text, "4\n");
    }

    #[test]
    fn test_round_trip_all_text() {
        let table = sample();
        let text = DelimitedWriter::default().to_text(&table).unwrap();
        let back = parse_text(&text, &ParseOptions::default().all_text(), &Logger::new()).unwrap();
        for row in 0..table.row_count() {
            for col in 0..table.column_count() {
                let original = table.formatted_value(row, col).unwrap();
                let reread = back.formatted_value(row, col).unwrap();
                assert_eq!(original, reread);
            }
        }
    }
}
