//! Column descriptors and per-column value formatting

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};

use super::value::CellValue;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Extra layouts accepted when parsing dates from text
const DATE_INPUT_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];
const DATETIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Declared value type of a column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Date,
    DateTime,
    Boolean,
    Array(Box<ValueType>),
}

impl ValueType {
    pub fn is_integer(&self) -> bool {
        matches!(self, ValueType::Int16 | ValueType::Int32 | ValueType::Int64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ValueType::Float32 | ValueType::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Int16 => write!(f, "int16"),
            ValueType::Int32 => write!(f, "int32"),
            ValueType::Int64 => write!(f, "int64"),
            ValueType::Float32 => write!(f, "float32"),
            ValueType::Float64 => write!(f, "float64"),
            ValueType::String => write!(f, "string"),
            ValueType::Date => write!(f, "date"),
            ValueType::DateTime => write!(f, "datetime"),
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Array(element) => write!(f, "array<{}>", element),
        }
    }
}

impl std::str::FromStr for ValueType {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        if let Some(inner) = lower
            .strip_prefix("array<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Ok(ValueType::Array(Box::new(inner.parse()?)));
        }
        match lower.as_str() {
            "int16" | "short" => Ok(ValueType::Int16),
            "int32" | "int" | "integer" => Ok(ValueType::Int32),
            "int64" | "long" => Ok(ValueType::Int64),
            "float32" | "float" => Ok(ValueType::Float32),
            "float64" | "double" => Ok(ValueType::Float64),
            "string" | "text" => Ok(ValueType::String),
            "date" => Ok(ValueType::Date),
            "datetime" => Ok(ValueType::DateTime),
            "boolean" | "bool" => Ok(ValueType::Boolean),
            _ => Err(TableError::InvalidArgument(format!("unknown value type: {}", s))),
        }
    }
}

/// Schema entry for one table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub value_type: ValueType,
    /// Display/serialization width; `None` is unconstrained
    pub width: Option<usize>,
    /// Fractional digits for numeric columns; `None` prints the shortest form
    pub precision: Option<usize>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub units: String,
}

impl Column {
    /// Create an unconstrained column
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            width: None,
            precision: None,
            description: String::new(),
            units: String::new(),
        }
    }

    pub fn string(name: impl Into<String>, width: usize) -> Self {
        Self::new(name, ValueType::String).with_width(width)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::Int32)
    }

    pub fn double(name: impl Into<String>, precision: usize) -> Self {
        Self::new(name, ValueType::Float64).with_precision(precision)
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    /// Case-insensitive name match
    pub fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    fn mismatch(&self, value: &CellValue) -> TableError {
        TableError::TypeMismatch {
            column: self.name.clone(),
            expected: self.value_type.to_string(),
            found: value.type_name().to_string(),
        }
    }

    /// Convert `value` into this column's type, allowing lossless widening only
    pub fn coerce(&self, value: CellValue) -> Result<CellValue> {
        if value.fits(&self.value_type) {
            return Ok(value);
        }
        let converted = match (&self.value_type, &value) {
            (ValueType::Int16, v) => v.as_i64().and_then(|i| i16::try_from(i).ok()).map(CellValue::Int16),
            (ValueType::Int32, v) => v.as_i64().and_then(|i| i32::try_from(i).ok()).map(CellValue::Int32),
            (ValueType::Int64, v) => v.as_i64().map(CellValue::Int64),
            (ValueType::Float32, CellValue::Int16(i)) => Some(CellValue::Float32(f32::from(*i))),
            (ValueType::Float32, CellValue::Float64(f)) if (*f as f32) as f64 == *f || f.is_nan() => {
                Some(CellValue::Float32(*f as f32))
            }
            (ValueType::Float64, v) if v.is_integer() || v.is_float() => v.as_f64().map(CellValue::Float64),
            (ValueType::DateTime, CellValue::Date(d)) => {
                Some(CellValue::DateTime(d.and_time(chrono::NaiveTime::MIN)))
            }
            _ => None,
        };
        converted.ok_or_else(|| self.mismatch(&value))
    }

    /// Parse a text token into this column's type. Blank text is null.
    pub fn parse_text(&self, text: &str) -> Result<CellValue> {
        parse_typed(&self.value_type, text).map_err(|_| {
            TableError::format(format!(
                "'{}' is not a valid {} for column '{}'",
                text, self.value_type, self.name
            ))
        })
    }

    /// Render a value through this column's declared type, width and precision
    pub fn format_value(&self, value: &CellValue) -> Result<String> {
        self.format_with_nan(value, "NaN")
    }

    /// Like [`Column::format_value`] with a substitutable NaN literal
    pub fn format_with_nan(&self, value: &CellValue, nan: &str) -> Result<String> {
        if value.fits(&self.value_type) {
            return Ok(format_typed(&self.value_type, self.precision, value, nan));
        }
        let value = self.coerce(value.clone())?;
        Ok(format_typed(&self.value_type, self.precision, &value, nan))
    }
}

fn format_typed(value_type: &ValueType, precision: Option<usize>, value: &CellValue, nan: &str) -> String {
    match (value_type, value) {
        (_, CellValue::Null) => String::new(),
        (ValueType::Float32, CellValue::Float32(f)) if precision.is_none() && !f.is_nan() => f.to_string(),
        (ValueType::Float32 | ValueType::Float64, v) => {
            let f = v.as_f64().unwrap_or(f64::NAN);
            format_float(f, precision, nan)
        }
        (ValueType::Array(element), CellValue::Array(items)) => items
            .iter()
            .map(|item| format_typed(element, precision, item, nan))
            .collect::<Vec<_>>()
            .join(";"),
        (_, v) => v.to_string(),
    }
}

/// Format a float with fixed fractional digits, or the shortest form when unset
pub fn format_float(value: f64, precision: Option<usize>, nan: &str) -> String {
    if value.is_nan() {
        return nan.to_string();
    }
    match precision {
        Some(p) => format!("{:.*}", p, value),
        None => value.to_string(),
    }
}

fn parse_typed(value_type: &ValueType, text: &str) -> std::result::Result<CellValue, ()> {
    let trimmed = text.trim();
    if trimmed.is_empty() && *value_type != ValueType::String {
        return Ok(CellValue::Null);
    }
    match value_type {
        ValueType::String => Ok(if text.is_empty() {
            CellValue::Null
        } else {
            CellValue::String(text.to_string())
        }),
        ValueType::Int16 => trimmed.parse().map(CellValue::Int16).map_err(|_| ()),
        ValueType::Int32 => trimmed.parse().map(CellValue::Int32).map_err(|_| ()),
        ValueType::Int64 => trimmed.parse().map(CellValue::Int64).map_err(|_| ()),
        ValueType::Float32 => parse_float(trimmed).map(|f| CellValue::Float32(f as f32)),
        ValueType::Float64 => parse_float(trimmed).map(CellValue::Float64),
        ValueType::Boolean => match trimmed.to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Ok(CellValue::Bool(true)),
            "false" | "f" | "no" | "n" | "0" => Ok(CellValue::Bool(false)),
            _ => Err(()),
        },
        ValueType::Date => parse_date(trimmed).map(CellValue::Date).ok_or(()),
        ValueType::DateTime => parse_datetime(trimmed).map(CellValue::DateTime).ok_or(()),
        ValueType::Array(element) => trimmed
            .split(';')
            .map(|part| parse_typed(element, part))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(CellValue::Array),
    }
}

fn parse_float(text: &str) -> std::result::Result<f64, ()> {
    if text.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    text.parse::<f64>().map_err(|_| ())
}

/// Parse a date in one of the accepted layouts
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Parse a date-time in one of the accepted layouts; a bare date means midnight
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_date(text).map(|d| d.and_time(chrono::NaiveTime::MIN)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uses_declared_precision() {
        let col = Column::double("value", 2);
        assert_eq!(col.format_value(&CellValue::Float64(2.5)).unwrap(), "2.50");
        assert_eq!(col.format_with_nan(&CellValue::Float64(f64::NAN), "-999").unwrap(), "-999");
        assert_eq!(col.format_value(&CellValue::Null).unwrap(), "");
    }

    #[test]
    fn test_format_rejects_mismatched_tag() {
        let col = Column::integer("n");
        assert!(matches!(
            col.format_value(&CellValue::from("x")),
            Err(TableError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_coerce_widens() {
        let col = Column::new("x", ValueType::Float64);
        assert_eq!(col.coerce(CellValue::Int32(3)).unwrap(), CellValue::Float64(3.0));
        let col = Column::integer("n");
        assert_eq!(col.coerce(CellValue::Int64(5)).unwrap(), CellValue::Int32(5));
        assert!(col.coerce(CellValue::Int64(i64::MAX)).is_err());
        assert!(col.coerce(CellValue::Float64(1.5)).is_err());
    }

    #[test]
    fn test_parse_text() {
        let col = Column::new("d", ValueType::Date);
        assert_eq!(
            col.parse_text("2024-02-29").unwrap(),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(col.parse_text("  ").unwrap(), CellValue::Null);
        assert!(Column::integer("n").parse_text("1.5").is_err());
    }

    #[test]
    fn test_value_type_from_str() {
        assert_eq!("double".parse::<ValueType>().unwrap(), ValueType::Float64);
        assert_eq!(
            "array<int32>".parse::<ValueType>().unwrap(),
            ValueType::Array(Box::new(ValueType::Int32))
        );
        assert!("blob".parse::<ValueType>().is_err());
    }
}
