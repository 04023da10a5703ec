//! Data model for runtime-typed tables

mod key;
mod schema;
mod table;
mod value;

pub use key::{KeyBuilder, KeyPart};
pub use schema::{format_float, parse_date, parse_datetime, Column, ValueType, DATETIME_FORMAT, DATE_FORMAT};
pub use table::{CellSource, FieldInit, Row, Substitution, Table};
pub use value::CellValue;
