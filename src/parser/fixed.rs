//! Fixed-width positional text reader

use std::fs;
use std::path::Path;

use crate::config::FixedWidthOptions;
use crate::error::{Result, TableError};
use crate::logger::Logger;
use crate::model::{CellValue, Column, Row, Table, ValueType};

const ROUTINE: &str = "FixedWidthParser";

/// One item of a fixed-width layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    Text { width: usize },
    Integer { width: usize },
    Double { width: usize, precision: usize },
    /// Characters skipped without creating a column
    Filler { width: usize },
}

impl FieldSpec {
    pub fn width(&self) -> usize {
        match self {
            FieldSpec::Text { width }
            | FieldSpec::Integer { width }
            | FieldSpec::Double { width, .. }
            | FieldSpec::Filler { width } => *width,
        }
    }

    fn column(&self, name: String) -> Option<Column> {
        match self {
            FieldSpec::Text { width } => Some(Column::string(name, *width)),
            FieldSpec::Integer { width } => Some(Column::new(name, ValueType::Int32).with_width(*width)),
            FieldSpec::Double { width, precision } => Some(
                Column::new(name, ValueType::Float64)
                    .with_width(*width)
                    .with_precision(*precision),
            ),
            FieldSpec::Filler { .. } => None,
        }
    }
}

/// Parse a layout such as `A10, I5, 2X, F8.3`
pub fn parse_format(format: &str) -> Result<Vec<FieldSpec>> {
    format
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|item| !item.is_empty())
        .map(parse_item)
        .collect()
}

fn parse_item(item: &str) -> Result<FieldSpec> {
    let bad = || TableError::InvalidArgument(format!("bad fixed-width format item '{}'", item));
    let upper = item.to_uppercase();

    // Filler may be written "3X" or "X3"
    if let Some(count) = upper.strip_suffix('X') {
        let width = if count.is_empty() { 1 } else { count.parse().map_err(|_| bad())? };
        return Ok(FieldSpec::Filler { width });
    }

    if !upper.is_char_boundary(1) {
        return Err(bad());
    }
    let (tag, rest) = upper.split_at(1);
    let (width, precision) = match rest.split_once('.') {
        Some((w, p)) => (w, Some(p)),
        None => (rest, None),
    };
    let width: usize = width.parse().map_err(|_| bad())?;
    if width == 0 {
        return Err(bad());
    }
    let precision = precision
        .map(|p| p.parse::<usize>().map_err(|_| bad()))
        .transpose()?;

    match tag {
        "A" | "S" => Ok(FieldSpec::Text { width }),
        "I" => Ok(FieldSpec::Integer { width }),
        "F" | "D" | "E" => Ok(FieldSpec::Double {
            width,
            precision: precision.unwrap_or(0),
        }),
        "X" => Ok(FieldSpec::Filler { width }),
        _ => Err(bad()),
    }
}

/// Read fixed-width text into a table
pub fn parse_fixed_text(text: &str, options: &FixedWidthOptions, logger: &Logger) -> Result<Table> {
    let specs = parse_format(&options.format)?;
    let mut columns = Vec::new();
    let mut layout = Vec::new();
    let mut position = 0usize;
    for spec in &specs {
        let name_idx = columns.len();
        let name = options
            .names
            .get(name_idx)
            .cloned()
            .unwrap_or_else(|| format!("Column{}", name_idx + 1));
        if let Some(column) = spec.column(name) {
            layout.push((position, spec.width()));
            columns.push(column);
        }
        position += spec.width();
    }

    let mut table = Table::new(columns.clone()).with_logger(logger.clone());
    for (idx, line) in text.lines().enumerate().skip(options.skip_lines) {
        if let Some(prefix) = &options.comment_prefix {
            if line.starts_with(prefix.as_str()) {
                table.add_comment(line[prefix.len()..].trim());
                continue;
            }
        }
        if line.trim().is_empty() {
            continue;
        }
        let chars: Vec<char> = line.chars().collect();
        let mut cells = Vec::with_capacity(columns.len());
        for (column, &(start, width)) in columns.iter().zip(&layout) {
            let end = (start + width).min(chars.len());
            let token: String = if start < chars.len() {
                chars[start..end].iter().collect()
            } else {
                String::new()
            };
            let value = column.parse_text(token.trim()).unwrap_or_else(|e| {
                logger.warn(ROUTINE, format!("line {}: {}", idx + 1, e));
                CellValue::Null
            });
            cells.push(value);
        }
        table.add_row(Row::new(cells).with_source_line(idx + 1))?;
    }
    Ok(table)
}

/// Read a fixed-width file into a table
pub fn read_fixed_width(path: &Path, options: &FixedWidthOptions, logger: &Logger) -> Result<Table> {
    let text = fs::read_to_string(path)?;
    let mut table = parse_fixed_text(&text, options, logger)?;
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        table.set_identifier(stem);
    }
    Ok(table)
}
