//! Per-row string manipulation and text-to-type casts

use crate::error::{Result, TableError};
use crate::model::{CellValue, Column, Table, ValueType};

use super::{Problems, RowFilter};

const ROUTINE: &str = "apply_string_operation";

/// One string operation. Patterns for `Replace` and `Remove` may be anchored
/// with a leading `^` (start only) and/or a trailing `$` (end only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringOperation {
    Append(String),
    Prepend(String),
    Replace { from: String, to: String },
    Remove(String),
    /// Keep the `index`-th (1-based) piece
    Split { delimiter: String, index: usize },
    /// `start` is 1-based, in characters; no length means to the end
    Substring { start: usize, length: Option<usize> },
    ToInteger,
    ToDouble,
    ToDate,
    ToDateTime,
}

impl StringOperation {
    fn cast_type(&self) -> Option<ValueType> {
        match self {
            StringOperation::ToInteger => Some(ValueType::Int32),
            StringOperation::ToDouble => Some(ValueType::Float64),
            StringOperation::ToDate => Some(ValueType::Date),
            StringOperation::ToDateTime => Some(ValueType::DateTime),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        let problem = match self {
            StringOperation::Split { delimiter, .. } if delimiter.is_empty() => "split delimiter is empty",
            StringOperation::Split { index: 0, .. } => "split index is 1-based",
            StringOperation::Substring { start: 0, .. } => "substring start is 1-based",
            StringOperation::Replace { from, .. } | StringOperation::Remove(from)
                if strip_anchors(from).1.is_empty() =>
            {
                "pattern is empty"
            }
            _ => return Ok(()),
        };
        Err(TableError::InvalidArgument(problem.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Anywhere,
    Start,
    End,
    Whole,
}

fn strip_anchors(pattern: &str) -> (Anchor, &str) {
    let (start, rest) = match pattern.strip_prefix('^') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let (end, rest) = match rest.strip_suffix('$') {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    let anchor = match (start, end) {
        (true, true) => Anchor::Whole,
        (true, false) => Anchor::Start,
        (false, true) => Anchor::End,
        (false, false) => Anchor::Anywhere,
    };
    (anchor, rest)
}

fn replace_anchored(text: &str, pattern: &str, to: &str) -> String {
    let (anchor, pattern) = strip_anchors(pattern);
    match anchor {
        Anchor::Anywhere => text.replace(pattern, to),
        Anchor::Start => match text.strip_prefix(pattern) {
            Some(rest) => format!("{}{}", to, rest),
            None => text.to_string(),
        },
        Anchor::End => match text.strip_suffix(pattern) {
            Some(rest) => format!("{}{}", rest, to),
            None => text.to_string(),
        },
        Anchor::Whole if text == pattern => to.to_string(),
        Anchor::Whole => text.to_string(),
    }
}

/// Apply a text operation; `None` means the result is null
fn transform(operation: &StringOperation, text: &str) -> Option<String> {
    let result = match operation {
        StringOperation::Append(suffix) => format!("{}{}", text, suffix),
        StringOperation::Prepend(prefix) => format!("{}{}", prefix, text),
        StringOperation::Replace { from, to } => replace_anchored(text, from, to),
        StringOperation::Remove(pattern) => replace_anchored(text, pattern, ""),
        StringOperation::Split { delimiter, index } => text.split(delimiter.as_str()).nth(index - 1)?.to_string(),
        StringOperation::Substring { start, length } => text
            .chars()
            .skip(start - 1)
            .take(length.unwrap_or(usize::MAX))
            .collect(),
        _ => text.to_string(),
    };
    Some(result)
}

#[derive(Debug, Clone)]
pub struct StringOptions {
    pub input: String,
    /// Output column, created when missing; `None` rewrites the input in place
    pub output: Option<String>,
    pub operation: StringOperation,
    pub filter: RowFilter,
}

impl StringOptions {
    pub fn new(input: impl Into<String>, operation: StringOperation) -> Self {
        Self {
            input: input.into(),
            output: None,
            operation,
            filter: RowFilter::default(),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = filter;
        self
    }
}

fn output_column(table: &mut Table, options: &StringOptions, input: usize) -> Result<usize> {
    let cast = options.operation.cast_type();
    let Some(name) = &options.output else {
        if cast.is_some() || table.columns()[input].value_type != ValueType::String {
            return Err(TableError::InvalidArgument(format!(
                "cannot rewrite column '{}' in place; give an output column",
                options.input
            )));
        }
        return Ok(input);
    };
    if let Some(index) = table.column_index(name) {
        return Ok(index);
    }
    let column = match cast {
        Some(value_type) => Column::new(name.clone(), value_type),
        None => {
            let mut column = Column::new(name.clone(), ValueType::String);
            column.width = table.columns()[input].width;
            column
        }
    };
    table.add_field(column, CellValue::Null, None)
}

/// Apply a string operation to every accepted row. Returns the number of rows written.
pub fn apply_string_operation(table: &mut Table, options: &StringOptions) -> Result<usize> {
    options.operation.validate()?;
    let input = table.field_index(&options.input)?;
    let filter = options.filter.compile(table)?;
    let output = output_column(table, options, input)?;
    let input_column = table.columns()[input].clone();
    let output_column = table.columns()[output].clone();
    let cast = options.operation.cast_type().is_some();

    let mut problems = Problems::new();
    let mut written = 0;
    for row in 0..table.row_count() {
        if !filter.accepts(table, row)? {
            continue;
        }
        let value = table.get_field_value(row, input)?;
        let result = if value.is_null() {
            Ok(CellValue::Null)
        } else {
            let text = match value.as_str() {
                Some(text) => text.to_string(),
                None => input_column.format_value(&value)?,
            };
            if cast {
                output_column.parse_text(text.trim())
            } else {
                Ok(transform(&options.operation, &text).map_or(CellValue::Null, CellValue::String))
            }
        };
        match result.and_then(|v| table.set_field_value(row, output, v, false)) {
            Ok(()) => written += 1,
            Err(e) => problems.push(row, e),
        }
    }

    table
        .logger()
        .debug(ROUTINE, format!("wrote {} rows into '{}'", written, output_column.name));
    problems.finish(ROUTINE, table.logger())?;
    Ok(written)
}
