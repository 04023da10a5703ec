//! tablekit - Runtime-typed in-memory tables
//!
//! Columns declare a type, rows are records. Tables are read from and written
//! to delimited text, dBase (DBF) and fixed-width files, and transformed with
//! relational-style operators (copy/filter, append, join, sort, compare,
//! arithmetic and string manipulation).

pub mod config;
pub mod error;
pub mod logger;
pub mod model;
pub mod ops;
pub mod output;
pub mod parser;

pub use config::{DbfReadMode, FixedWidthOptions, HeaderMode, ParseOptions, WriteOptions};
pub use error::{Result, TableError};
pub use logger::{Level, LogObserver, Logger};
pub use model::{CellValue, Column, Row, Table, ValueType};
