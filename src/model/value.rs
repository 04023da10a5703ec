//! Cell values

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::schema::ValueType;

/// A single cell payload, tagged with its runtime type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// The missing marker
    #[default]
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Array(Vec<CellValue>),
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            (CellValue::String(a), CellValue::String(b)) => a == b,
            (CellValue::Date(a), CellValue::Date(b)) => a == b,
            (CellValue::DateTime(a), CellValue::DateTime(b)) => a == b,
            (CellValue::Array(a), CellValue::Array(b)) => a == b,
            _ => match (NumericKey::of(self), NumericKey::of(other)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            CellValue::Null => 0u8.hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::String(s) => s.hash(state),
            CellValue::Date(d) => d.hash(state),
            CellValue::DateTime(dt) => dt.hash(state),
            CellValue::Array(items) => items.hash(state),
            _ => NumericKey::of(self).hash(state),
        }
    }
}

/// Canonical form of a numeric cell, shared by equality, hashing and match keys.
///
/// Integers keep their exact value. A float that converts to an integer and
/// back unchanged collapses onto that integer, every NaN collapses onto one
/// bit pattern, and any other float is keyed by its bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NumericKey {
    Integral(i64),
    Bits(u64),
}

impl NumericKey {
    pub(crate) fn of(value: &CellValue) -> Option<Self> {
        if let Some(i) = value.as_i64() {
            return Some(NumericKey::Integral(i));
        }
        value.as_f64().map(Self::of_float)
    }

    fn of_float(f: f64) -> Self {
        if f.is_nan() {
            NumericKey::Bits(f64::NAN.to_bits())
        } else if (f as i64) as f64 == f {
            NumericKey::Integral(f as i64)
        } else {
            NumericKey::Bits(f.to_bits())
        }
    }
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Null, or a string containing only whitespace
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            CellValue::Int16(_) | CellValue::Int32(_) | CellValue::Int64(_)
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, CellValue::Float32(_) | CellValue::Float64(_))
    }

    /// Integer payload widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int16(i) => Some(i64::from(*i)),
            CellValue::Int32(i) => Some(i64::from(*i)),
            CellValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Any numeric payload as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int16(i) => Some(f64::from(*i)),
            CellValue::Int32(i) => Some(f64::from(*i)),
            CellValue::Int64(i) => Some(*i as f64),
            CellValue::Float32(f) => Some(f64::from(*f)),
            CellValue::Float64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the runtime tag, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Bool(_) => "boolean",
            CellValue::Int16(_) => "int16",
            CellValue::Int32(_) => "int32",
            CellValue::Int64(_) => "int64",
            CellValue::Float32(_) => "float32",
            CellValue::Float64(_) => "float64",
            CellValue::String(_) => "string",
            CellValue::Date(_) => "date",
            CellValue::DateTime(_) => "datetime",
            CellValue::Array(_) => "array",
        }
    }

    /// Whether this value can be stored in a column of `value_type` without conversion
    pub fn fits(&self, value_type: &ValueType) -> bool {
        match (self, value_type) {
            (CellValue::Null, _) => true,
            (CellValue::Bool(_), ValueType::Boolean)
            | (CellValue::Int16(_), ValueType::Int16)
            | (CellValue::Int32(_), ValueType::Int32)
            | (CellValue::Int64(_), ValueType::Int64)
            | (CellValue::Float32(_), ValueType::Float32)
            | (CellValue::Float64(_), ValueType::Float64)
            | (CellValue::String(_), ValueType::String)
            | (CellValue::Date(_), ValueType::Date)
            | (CellValue::DateTime(_), ValueType::DateTime) => true,
            (CellValue::Array(items), ValueType::Array(element)) => {
                items.iter().all(|item| item.fits(element))
            }
            _ => false,
        }
    }

    /// Match-key equality: strings compare case-insensitively, everything else by value
    pub fn equals_ignore_case(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::String(a), CellValue::String(b)) => a.to_lowercase() == b.to_lowercase(),
            _ => self == other,
        }
    }

    /// Compare with numeric tolerance
    pub fn equals_with_tolerance(&self, other: &Self, tolerance: f64) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => (a.is_nan() && b.is_nan()) || (a - b).abs() <= tolerance,
            _ => self == other,
        }
    }

    /// Ordering used by sort keys. Nulls sort first, NaN after all numbers.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => Ordering::Equal,
            (CellValue::Null, _) => Ordering::Less,
            (_, CellValue::Null) => Ordering::Greater,
            (CellValue::String(a), CellValue::String(b)) => a.cmp(b),
            (CellValue::Date(a), CellValue::Date(b)) => a.cmp(b),
            (CellValue::DateTime(a), CellValue::DateTime(b)) => a.cmp(b),
            (CellValue::Date(a), CellValue::DateTime(b)) => a.and_time(chrono::NaiveTime::MIN).cmp(b),
            (CellValue::DateTime(a), CellValue::Date(b)) => a.cmp(&b.and_time(chrono::NaiveTime::MIN)),
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a.total_cmp(&b),
                    _ => Ordering::Equal,
                },
            },
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int16(i) => write!(f, "{}", i),
            CellValue::Int32(i) => write!(f, "{}", i),
            CellValue::Int64(i) => write!(f, "{}", i),
            CellValue::Float32(v) => write!(f, "{}", v),
            CellValue::Float64(v) => write!(f, "{}", v),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Date(d) => write!(f, "{}", d.format(super::schema::DATE_FORMAT)),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format(super::schema::DATETIME_FORMAT)),
            CellValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "{}", parts.join(";"))
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<i16> for CellValue {
    fn from(i: i16) -> Self {
        CellValue::Int16(i)
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        CellValue::Int32(i)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int64(i)
    }
}

impl From<f32> for CellValue {
    fn from(f: f32) -> Self {
        CellValue::Float32(f)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float64(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::DateTime(dt)
    }
}

impl<T> From<Option<T>> for CellValue
where
    T: Into<CellValue>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => CellValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_width_numeric_equality() {
        assert_eq!(CellValue::Int32(7), CellValue::Int64(7));
        assert_eq!(CellValue::Int16(2), CellValue::Float64(2.0));
        assert_ne!(CellValue::Int32(2), CellValue::Float64(2.5));
        assert_eq!(CellValue::Float64(f64::NAN), CellValue::Float64(f64::NAN));
    }

    fn hash_of(value: &CellValue) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equal_values_hash_equal() {
        let big_int = CellValue::Int64(1 << 60);
        let big_float = CellValue::Float64(2f64.powi(60));
        assert_eq!(big_int, big_float);
        assert_eq!(hash_of(&big_int), hash_of(&big_float));

        let nan = CellValue::Float64(f64::NAN);
        let negative_nan = CellValue::Float64(-f64::NAN);
        assert_eq!(nan, negative_nan);
        assert_eq!(hash_of(&nan), hash_of(&negative_nan));

        assert_eq!(CellValue::Float64(-0.0), CellValue::Int32(0));
        assert_eq!(hash_of(&CellValue::Float64(-0.0)), hash_of(&CellValue::Int32(0)));

        // An integer the float cannot represent exactly is a different value
        assert_ne!(CellValue::Int64((1 << 60) + 1), big_float);
    }

    #[test]
    fn test_equals_ignore_case() {
        let a = CellValue::from("Oslo");
        let b = CellValue::from("OSLO");
        assert!(a.equals_ignore_case(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_sort_cmp_nulls_first() {
        assert_eq!(CellValue::Null.sort_cmp(&CellValue::Int32(0)), Ordering::Less);
        assert_eq!(
            CellValue::Float64(f64::NAN).sort_cmp(&CellValue::Float64(1e300)),
            Ordering::Greater
        );
        assert_eq!(CellValue::Int64(3).sort_cmp(&CellValue::Int32(3)), Ordering::Equal);
    }

    #[test]
    fn test_fits() {
        assert!(CellValue::Null.fits(&ValueType::Int32));
        assert!(CellValue::Int32(1).fits(&ValueType::Int32));
        assert!(!CellValue::Int32(1).fits(&ValueType::Float64));
        let arr = CellValue::Array(vec![CellValue::Int16(1), CellValue::Null]);
        assert!(arr.fits(&ValueType::Array(Box::new(ValueType::Int16))));
    }
}
