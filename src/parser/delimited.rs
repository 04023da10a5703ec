//! Delimited text reader (CSV, TSV and friends)

use std::fs;
use std::path::Path;

use crate::config::{HeaderMode, ParseOptions};
use crate::error::{Result, TableError};
use crate::logger::Logger;
use crate::model::{CellValue, Column, Row, Table};

use super::infer::infer_columns;
use super::Parser;

const ROUTINE: &str = "DelimitedParser";

/// Parser for delimited text files
#[derive(Debug, Clone, Default)]
pub struct DelimitedParser {
    options: ParseOptions,
}

impl DelimitedParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse delimited text already held in memory
    pub fn parse_str(&self, text: &str, logger: &Logger) -> Result<Table> {
        parse_text(text, &self.options, logger)
    }
}

impl Parser for DelimitedParser {
    fn parse(&self, path: &Path, logger: &Logger) -> Result<Table> {
        let text = fs::read_to_string(path).map_err(|e| {
            logger.warn(ROUTINE, format!("cannot read {}: {}", path.display(), e));
            e
        })?;
        let mut table = parse_text(&text, &self.options, logger)?;
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            table.set_identifier(stem);
        }
        Ok(table)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "csv" | "tsv" | "txt")
    }
}

/// Parse delimited text into a table
pub fn parse_text(text: &str, options: &ParseOptions, logger: &Logger) -> Result<Table> {
    let mut comments = Vec::new();
    let mut data_lines: Vec<(usize, &str)> = Vec::new();

    for (idx, line) in text.lines().enumerate().skip(options.skip_lines) {
        if !options.comment_prefix.is_empty() && line.starts_with(&options.comment_prefix) {
            comments.push(line[options.comment_prefix.len()..].trim().to_string());
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        data_lines.push((idx + 1, line));
    }

    let has_header = match options.header {
        HeaderMode::Present => !data_lines.is_empty(),
        HeaderMode::Absent => false,
        HeaderMode::Auto => data_lines
            .first()
            .map(|(_, line)| line.trim_start().starts_with('"'))
            .unwrap_or(false),
    };

    let header_tokens = if has_header {
        let (_, line) = data_lines.remove(0);
        tokenize(&[(0, line)], options)?
            .into_iter()
            .next()
            .map(|(_, tokens)| tokens)
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let mut records = tokenize(&data_lines, options)?;
    if let Some(max) = options.max_rows {
        records.truncate(max);
    }

    let column_count = records
        .iter()
        .map(|(_, tokens)| tokens.len())
        .chain(std::iter::once(header_tokens.len()))
        .max()
        .unwrap_or(0);

    let names = column_names(&header_tokens, column_count);
    for (_, tokens) in &mut records {
        tokens.resize(column_count, String::new());
    }

    let token_rows: Vec<Vec<String>> = records.iter().map(|(_, t)| t.clone()).collect();
    let columns = infer_columns(&names, &token_rows, options);

    let mut table = Table::new(columns.clone()).with_logger(logger.clone());
    for comment in comments {
        table.add_comment(comment);
    }

    let mut bad_cells = 0usize;
    for (line, tokens) in records {
        let cells: Vec<CellValue> = tokens
            .iter()
            .zip(&columns)
            .map(|(token, column)| {
                convert_token(token, column, options).unwrap_or_else(|e| {
                    bad_cells += 1;
                    logger.warn(ROUTINE, format!("line {}: {}", line, e));
                    CellValue::Null
                })
            })
            .collect();
        table.add_row(Row::new(cells).with_source_line(line))?;
    }
    if bad_cells > 0 {
        logger.warn(ROUTINE, format!("{} cell(s) could not be converted and were left empty", bad_cells));
    }

    logger.debug(
        ROUTINE,
        format!("read {} rows x {} columns", table.row_count(), table.column_count()),
    );
    Ok(table)
}

fn convert_token(token: &str, column: &Column, options: &ParseOptions) -> Result<CellValue> {
    if column.value_type.is_float() && token.trim() == options.nan_literal {
        return column.coerce(CellValue::Float64(f64::NAN));
    }
    column.parse_text(token)
}

/// Header names, defaulting blanks to `Column<n>` and suffixing duplicates
fn column_names(header: &[String], count: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(count);
    for i in 0..count {
        let base = header
            .get(i)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("Column{}", i + 1));
        let taken = |candidate: &str, names: &[String]| {
            names.iter().any(|n| n.to_lowercase() == candidate.to_lowercase())
        };
        let mut name = base.clone();
        let mut suffix = 2;
        while taken(&name, &names) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        names.push(name);
    }
    names
}

/// Split lines into tokens. Quoted tokens lose their quotes and doubled quotes collapse.
fn tokenize(lines: &[(usize, &str)], options: &ParseOptions) -> Result<Vec<(usize, Vec<String>)>> {
    if lines.is_empty() {
        return Ok(Vec::new());
    }
    let joined = lines.iter().map(|(_, l)| *l).collect::<Vec<_>>().join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(options.delimiter)
        .double_quote(true)
        .from_reader(joined.as_bytes());

    let mut out = Vec::with_capacity(lines.len());
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| TableError::format(format!("malformed delimited text: {}", e)))?;
        let line_in_joined = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);
        let line = lines
            .get(line_in_joined.saturating_sub(1))
            .map(|(n, _)| *n)
            .unwrap_or(line_in_joined);

        let tokens: Vec<String> = record
            .iter()
            .filter(|t| !(options.merge_delimiters && t.is_empty()))
            .map(|t| trim_token(t, options))
            .collect();
        out.push((line, tokens));
    }
    Ok(out)
}

fn trim_token(token: &str, options: &ParseOptions) -> String {
    // A quote after leading blanks is not a field start for the csv reader
    if token.starts_with(char::is_whitespace) {
        if let Some(body) = quoted_body(token.trim()) {
            return body;
        }
    }
    let mut t = token;
    if options.trim_leading {
        t = t.trim_start();
    }
    if options.trim_trailing {
        t = t.trim_end();
    }
    t.to_string()
}

fn quoted_body(token: &str) -> Option<String> {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        Some(token[1..token.len() - 1].replace("\"\"", "\""))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{CollectingObserver, Level};
    use crate::model::ValueType;

    #[test]
    fn test_parse_with_inference() {
        let text = "\"id\",\"value\"\n\"A\",1\n\"B\",2.5\n";
        let table = parse_text(text, &ParseOptions::default(), &Logger::new()).unwrap();

        assert_eq!(table.column(0).unwrap().value_type, ValueType::String);
        assert_eq!(table.column(1).unwrap().value_type, ValueType::Float64);
        assert_eq!(table.get_field_value_by_name(1, "value").unwrap(), CellValue::Float64(2.5));
        assert_eq!(table.get_field_value(0, 0).unwrap(), CellValue::from("A"));
    }

    #[test]
    fn test_auto_header_absent_without_quotes() {
        let text = "1,2\n3,4\n";
        let table = parse_text(text, &ParseOptions::default(), &Logger::new()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column(0).unwrap().name, "Column1");
        assert_eq!(table.column(1).unwrap().value_type, ValueType::Int32);
    }

    #[test]
    fn test_short_rows_pad_and_duplicate_names() {
        let text = "\"a\",\"a\",\"b\"\nx,y\nx,y,z,w\n";
        let table = parse_text(text, &ParseOptions::default(), &Logger::new()).unwrap();
        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a_2", "b", "Column4"]);
        assert!(table.get_field_value(0, 3).unwrap().is_null());
    }

    #[test]
    fn test_comments_skip_and_cap() {
        let text = "junk line\n# produced by model run 7\n\"n\"\n1\n2\n3\n";
        let options = ParseOptions::default().with_skip_lines(1).with_max_rows(2);
        let table = parse_text(text, &options, &Logger::new()).unwrap();
        assert_eq!(table.comments(), &["produced by model run 7".to_string()]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.row(1).unwrap().source_line, Some(5));
    }

    #[test]
    fn test_quoted_tokens_unescape() {
        let text = "\"q\"\n\"say \"\"hi\"\"\"\n";
        let table = parse_text(text, &ParseOptions::default(), &Logger::new()).unwrap();
        assert_eq!(table.get_field_value(0, 0).unwrap(), CellValue::from("say \"hi\""));
    }

    #[test]
    fn test_quoted_tokens_after_blanks() {
        let text = "\"id\", \"value\"\n\"A\", 1\n\"B \"\"x\"\"\", 2.5\n";
        let table = parse_text(text, &ParseOptions::default(), &Logger::new()).unwrap();
        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "value"]);
        assert_eq!(table.get_field_value(0, 0).unwrap(), CellValue::from("A"));
        assert_eq!(table.get_field_value(1, 0).unwrap(), CellValue::from("B \"x\""));
        assert_eq!(table.get_field_value(1, 1).unwrap(), CellValue::Float64(2.5));

        // Quotes inside a properly quoted field survive
        let text = "\"q\"\n\"\"\"x\"\"\"\n";
        let table = parse_text(text, &ParseOptions::default(), &Logger::new()).unwrap();
        assert_eq!(table.get_field_value(0, 0).unwrap(), CellValue::from("\"x\""));
    }

    #[test]
    fn test_explicit_header_modes() {
        let text = "id,value\nA,1\n";
        let present = ParseOptions::default().with_header(HeaderMode::Present);
        let table = parse_text(text, &present, &Logger::new()).unwrap();
        assert_eq!(table.column(0).unwrap().name, "id");
        assert_eq!(table.row_count(), 1);

        let absent = ParseOptions::default().with_header(HeaderMode::Absent);
        let quoted = "\"id\",\"value\"\n\"A\",1\n";
        let table = parse_text(quoted, &absent, &Logger::new()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column(1).unwrap().name, "Column2");
        assert_eq!(table.get_field_value(0, 0).unwrap(), CellValue::from("id"));
        assert_eq!(table.column(1).unwrap().value_type, ValueType::String);
    }

    #[test]
    fn test_trim_disabled_keeps_blanks() {
        let text = "\"name\"\n  ash \n";
        let kept = ParseOptions::default().all_text().with_trim(false, false);
        let table = parse_text(text, &kept, &Logger::new()).unwrap();
        assert_eq!(table.get_field_value(0, 0).unwrap(), CellValue::from("  ash "));

        let leading_only = ParseOptions::default().all_text().with_trim(true, false);
        let table = parse_text(text, &leading_only, &Logger::new()).unwrap();
        assert_eq!(table.get_field_value(0, 0).unwrap(), CellValue::from("ash "));
    }

    #[test]
    fn test_merge_delimiters() {
        let text = "1   2  3\n4 5 6\n";
        let options = ParseOptions::default()
            .with_delimiter(b' ')
            .with_merge_delimiters(true);
        let table = parse_text(text, &options, &Logger::new()).unwrap();
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.get_field_value(0, 2).unwrap(), CellValue::Int32(3));
    }

    #[test]
    fn test_all_text_mode() {
        let text = "\"n\"\n1\n2.5\n";
        let table = parse_text(text, &ParseOptions::default().all_text(), &Logger::new()).unwrap();
        assert_eq!(table.column(0).unwrap().value_type, ValueType::String);
        assert_eq!(table.get_field_value(1, 0).unwrap(), CellValue::from("2.5"));
    }

    #[test]
    fn test_unconvertible_override_logs_warning() {
        let observer = CollectingObserver::new();
        let logger = Logger::with_observer(observer.clone());
        let text = "\"n\"\n1\nabc\n";
        let options = ParseOptions::default().with_column_type("n", ValueType::Int32);
        let table = parse_text(text, &options, &logger).unwrap();
        assert!(table.get_field_value(1, 0).unwrap().is_null());
        assert!(!observer.at_least(Level::Warning).is_empty());
    }
}
