//! Per-row arithmetic between two numeric operands

use std::fmt;

use crate::error::{Result, TableError};
use crate::model::{CellValue, Column, Table, ValueType};

use super::{Problems, RowFilter};

const ROUTINE: &str = "apply_arithmetic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Truncate the left operand to an integer; the right operand is ignored
    CastToInteger,
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
            ArithmeticOp::CastToInteger => "int",
        };
        f.write_str(symbol)
    }
}

impl std::str::FromStr for ArithmeticOp {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "+" | "add" => Ok(ArithmeticOp::Add),
            "-" | "subtract" | "sub" => Ok(ArithmeticOp::Subtract),
            "*" | "x" | "multiply" | "mul" => Ok(ArithmeticOp::Multiply),
            "/" | "divide" | "div" => Ok(ArithmeticOp::Divide),
            "int" | "cast" => Ok(ArithmeticOp::CastToInteger),
            other => Err(TableError::InvalidArgument(format!("unknown arithmetic operator '{}'", other))),
        }
    }
}

/// A column reference or a literal
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Integer(i64),
    Number(f64),
}

impl Operand {
    pub fn column(name: impl Into<String>) -> Self {
        Operand::Column(name.into())
    }
}

#[derive(Debug, Clone)]
pub struct ArithmeticOptions {
    pub left: Operand,
    pub right: Option<Operand>,
    pub op: ArithmeticOp,
    /// Output column, created when missing
    pub output: String,
    /// Written when an input is missing or NaN, or on division by zero
    pub non_value: f64,
    pub filter: RowFilter,
}

impl ArithmeticOptions {
    pub fn new(left: Operand, op: ArithmeticOp, right: Option<Operand>, output: impl Into<String>) -> Self {
        Self {
            left,
            right,
            op,
            output: output.into(),
            non_value: f64::NAN,
            filter: RowFilter::default(),
        }
    }

    pub fn with_non_value(mut self, non_value: f64) -> Self {
        self.non_value = non_value;
        self
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Operand bound to a table
enum Bound {
    Column(usize),
    Value(CellValue),
}

impl Bound {
    fn bind(table: &Table, operand: &Operand) -> Result<(Self, bool)> {
        Ok(match operand {
            Operand::Column(name) => {
                let index = table.field_index(name)?;
                let value_type = &table.columns()[index].value_type;
                if !value_type.is_numeric() {
                    return Err(TableError::InvalidArgument(format!(
                        "arithmetic input '{}' is {}, not numeric",
                        name, value_type
                    )));
                }
                (Bound::Column(index), value_type.is_integer())
            }
            Operand::Integer(i) => (Bound::Value(CellValue::Int64(*i)), true),
            Operand::Number(f) => (Bound::Value(CellValue::Float64(*f)), false),
        })
    }

    fn read(&self, table: &Table, row: usize) -> Result<CellValue> {
        match self {
            Bound::Column(index) => table.get_field_value(row, *index),
            Bound::Value(value) => Ok(value.clone()),
        }
    }
}

/// Outcome of one row before it is stored
enum Computed {
    Integer(i64),
    Number(f64),
    /// Inputs missing or NaN, or division by zero
    NonValue,
    /// Integer overflow
    Overflow,
}

fn integer_op(op: ArithmeticOp, a: i64, b: Option<i64>) -> Computed {
    let result = match (op, b) {
        (ArithmeticOp::CastToInteger, _) => Some(a),
        (_, None) => return Computed::NonValue,
        (ArithmeticOp::Add, Some(b)) => a.checked_add(b),
        (ArithmeticOp::Subtract, Some(b)) => a.checked_sub(b),
        (ArithmeticOp::Multiply, Some(b)) => a.checked_mul(b),
        (ArithmeticOp::Divide, Some(0)) => return Computed::NonValue,
        (ArithmeticOp::Divide, Some(b)) => a.checked_div(b),
    };
    result.map_or(Computed::Overflow, Computed::Integer)
}

fn float_op(op: ArithmeticOp, a: f64, b: Option<f64>) -> Computed {
    if a.is_nan() {
        return Computed::NonValue;
    }
    if op == ArithmeticOp::CastToInteger {
        let truncated = a.trunc();
        if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
            return Computed::Overflow;
        }
        return Computed::Integer(truncated as i64);
    }
    let Some(b) = b.filter(|b| !b.is_nan()) else {
        return Computed::NonValue;
    };
    match op {
        ArithmeticOp::Add => Computed::Number(a + b),
        ArithmeticOp::Subtract => Computed::Number(a - b),
        ArithmeticOp::Multiply => Computed::Number(a * b),
        ArithmeticOp::Divide if b == 0.0 => Computed::NonValue,
        ArithmeticOp::Divide => Computed::Number(a / b),
        ArithmeticOp::CastToInteger => Computed::NonValue,
    }
}

fn compute(op: ArithmeticOp, left: &CellValue, right: Option<&CellValue>) -> Computed {
    if left.is_null() || right.is_some_and(CellValue::is_null) {
        return Computed::NonValue;
    }
    let right_int = right.and_then(CellValue::as_i64);
    match left.as_i64() {
        Some(a) if op == ArithmeticOp::CastToInteger || right_int.is_some() => integer_op(op, a, right_int),
        _ => match left.as_f64() {
            Some(a) => float_op(op, a, right.and_then(CellValue::as_f64)),
            None => Computed::NonValue,
        },
    }
}

fn non_value_cell(column: &Column, non_value: f64) -> CellValue {
    match &column.value_type {
        t if t.is_integer() && non_value.is_nan() => CellValue::Null,
        t if t.is_integer() => CellValue::Int64(non_value as i64),
        ValueType::Float32 => CellValue::Float32(non_value as f32),
        _ => CellValue::Float64(non_value),
    }
}

/// Convert a computed result into a value of `column`'s type
fn store(column: &Column, computed: Computed, non_value: f64) -> Result<CellValue> {
    let integer_column = column.value_type.is_integer();
    let value = match computed {
        Computed::NonValue => return Ok(non_value_cell(column, non_value)),
        Computed::Overflow => return Err(TableError::InvalidArgument("integer overflow".into())),
        Computed::Integer(i) if integer_column => CellValue::Int64(i),
        Computed::Integer(i) => CellValue::Float64(i as f64),
        Computed::Number(f) if integer_column && f.is_nan() => return Ok(non_value_cell(column, non_value)),
        Computed::Number(f) if integer_column => CellValue::Int64(f.trunc() as i64),
        Computed::Number(f) => CellValue::Float64(f),
    };
    match (&column.value_type, value) {
        (ValueType::Float32, CellValue::Float64(f)) => Ok(CellValue::Float32(f as f32)),
        (_, value) => column.coerce(value),
    }
}

/// Apply `left op right` to every accepted row, writing into the output column.
/// Returns the number of rows written.
pub fn apply_arithmetic(table: &mut Table, options: &ArithmeticOptions) -> Result<usize> {
    let (left, left_integer) = Bound::bind(table, &options.left)?;
    let (right, right_integer) = match &options.right {
        _ if options.op == ArithmeticOp::CastToInteger => (None, true),
        Some(operand) => {
            let (bound, integer) = Bound::bind(table, operand)?;
            (Some(bound), integer)
        }
        None => {
            return Err(TableError::InvalidArgument(format!(
                "operator {} needs a right operand",
                options.op
            )))
        }
    };
    let filter = options.filter.compile(table)?;

    let output = match table.column_index(&options.output) {
        Some(index) => {
            let value_type = &table.columns()[index].value_type;
            if !value_type.is_numeric() {
                return Err(TableError::InvalidArgument(format!(
                    "arithmetic output '{}' is {}, not numeric",
                    options.output, value_type
                )));
            }
            index
        }
        None => {
            let integer_output =
                options.op == ArithmeticOp::CastToInteger || (left_integer && right_integer);
            let column = if integer_output {
                Column::integer(options.output.clone())
            } else {
                Column::new(options.output.clone(), ValueType::Float64)
            };
            table.add_field(column, CellValue::Null, None)?
        }
    };
    let column = table.columns()[output].clone();

    let mut problems = Problems::new();
    let mut written = 0;
    for row in 0..table.row_count() {
        if !filter.accepts(table, row)? {
            continue;
        }
        let a = left.read(table, row)?;
        let b = match &right {
            Some(bound) => Some(bound.read(table, row)?),
            None => None,
        };
        let computed = compute(options.op, &a, b.as_ref());
        let value = match store(&column, computed, options.non_value) {
            Ok(value) => value,
            Err(e) => {
                let right_text = b.as_ref().map(|v| v.to_string()).unwrap_or_default();
                problems.push(row, format!("{} {} {}: {}", a, options.op, right_text, e));
                non_value_cell(&column, options.non_value)
            }
        };
        match table.set_field_value(row, output, value, false) {
            Ok(()) => written += 1,
            Err(e) => problems.push(row, e),
        }
    }

    table
        .logger()
        .debug(ROUTINE, format!("wrote {} rows into '{}'", written, column.name));
    problems.finish(ROUTINE, table.logger())?;
    Ok(written)
}
