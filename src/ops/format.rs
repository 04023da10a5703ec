//! Compose several columns into one text column through a template

use crate::error::{Result, TableError};
use crate::model::{CellValue, Column, Table, ValueType};

use super::Problems;

const ROUTINE: &str = "format_columns";

/// Template formatting of several input columns.
///
/// `{}` takes the next input in order and `{N}` the N-th (1-based) input.
/// `{{` and `}}` are literal braces.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub template: String,
    pub inputs: Vec<String>,
    pub output: String,
    /// Place a newly created output column before this column
    pub insert_before: Option<String>,
}

impl FormatOptions {
    pub fn new(template: impl Into<String>, inputs: Vec<String>, output: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            inputs,
            output: output.into(),
            insert_before: None,
        }
    }

    pub fn insert_before(mut self, column: impl Into<String>) -> Self {
        self.insert_before = Some(column.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Input(usize),
}

fn compile_template(template: &str, inputs: usize) -> Result<Vec<Segment>> {
    let bad = |why: &str| TableError::InvalidArgument(format!("template '{}': {}", template, why));
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut next = 0;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        _ => return Err(bad("unterminated or malformed placeholder")),
                    }
                }
                let index = if digits.is_empty() {
                    next += 1;
                    next - 1
                } else {
                    let n: usize = digits.parse().map_err(|_| bad("placeholder out of range"))?;
                    if n == 0 {
                        return Err(bad("placeholders are 1-based"));
                    }
                    n - 1
                };
                if index >= inputs {
                    return Err(bad(&format!("refers to input {} of {}", index + 1, inputs)));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Input(index));
            }
            '}' => return Err(bad("unmatched '}'")),
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Fill the output column from the template for every row.
/// A row with any null input gets a null output. Returns the rows written.
pub fn format_columns(table: &mut Table, options: &FormatOptions) -> Result<usize> {
    let segments = compile_template(&options.template, options.inputs.len())?;
    for name in &options.inputs {
        table.field_index(name)?;
    }

    let mut problems = Problems::new();
    let output = match table.column_index(&options.output) {
        Some(index) => index,
        None => {
            let position = match &options.insert_before {
                Some(name) => table.column_index(name).unwrap_or_else(|| {
                    problems.push_general(format!("column '{}' not found; output appended", name));
                    table.column_count()
                }),
                None => table.column_count(),
            };
            let column = Column::new(options.output.clone(), ValueType::String);
            table.insert_field(position, column, CellValue::Null, None)?
        }
    };
    // Re-resolve, the inserted output may have shifted input positions
    let inputs = options
        .inputs
        .iter()
        .map(|name| table.field_index(name))
        .collect::<Result<Vec<_>>>()?;

    let mut written = 0;
    for row in 0..table.row_count() {
        let mut texts = Vec::with_capacity(inputs.len());
        for &input in &inputs {
            let value = table.get_field_value(row, input)?;
            if value.is_null() {
                break;
            }
            texts.push(table.columns()[input].format_value(&value)?);
        }
        let value = if texts.len() < inputs.len() {
            CellValue::Null
        } else {
            let mut text = String::new();
            for segment in &segments {
                match segment {
                    Segment::Literal(literal) => text.push_str(literal),
                    Segment::Input(i) => text.push_str(&texts[*i]),
                }
            }
            CellValue::String(text)
        };
        match table.set_field_value(row, output, value, false) {
            Ok(()) => written += 1,
            Err(e) => problems.push(row, e),
        }
    }

    table.logger().debug(ROUTINE, format!("formatted {} rows", written));
    problems.finish(ROUTINE, table.logger())?;
    Ok(written)
}
