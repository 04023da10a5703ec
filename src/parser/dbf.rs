//! dBase (DBF) reader and the shared header layout
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! 0      version
//! 1..4   last update: year - 1900, month, day
//! 4..8   row count (u32)
//! 8..10  header length (u16)
//! 10..12 record length (u16)
//! 12..32 reserved
//! 32..   one 32-byte descriptor per field, then 0x0D
//! ```
//!
//! Each record starts with a delete flag (space = live) followed by the
//! fixed-width field text. The file ends with 0x1A.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate};

use crate::config::DbfReadMode;
use crate::error::{Result, TableError};
use crate::logger::Logger;
use crate::model::{CellSource, CellValue, Column, Row, Substitution, Table, ValueType};

use super::Parser;

pub const HEADER_PROLOG_LEN: usize = 32;
pub const DESCRIPTOR_LEN: usize = 32;
pub const HEADER_TERMINATOR: u8 = 0x0D;
pub const EOF_MARKER: u8 = 0x1A;
pub const LIVE_RECORD: u8 = b' ';
pub const DELETED_RECORD: u8 = b'*';
pub const DBASE_III: u8 = 0x03;
/// Longest field name stored in a descriptor (the 11th byte is the terminator)
pub const MAX_NAME_LEN: usize = 10;

const ROUTINE: &str = "DbfParser";

/// Field type codes supported by this codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbfFieldType {
    /// `C`: space-padded text
    Character,
    /// `N`: numeric text, read as a double
    Numeric,
    /// `F`: floating text
    Float,
    /// `I`: integer text
    Integer,
}

impl DbfFieldType {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            b'C' => Ok(DbfFieldType::Character),
            b'N' => Ok(DbfFieldType::Numeric),
            b'F' => Ok(DbfFieldType::Float),
            b'I' => Ok(DbfFieldType::Integer),
            other => Err(TableError::format(format!(
                "unsupported DBF field type code '{}' (0x{:02X})",
                other as char, other
            ))),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            DbfFieldType::Character => b'C',
            DbfFieldType::Numeric => b'N',
            DbfFieldType::Float => b'F',
            DbfFieldType::Integer => b'I',
        }
    }

    /// Field type used to store a column, if the codec can store it
    pub fn for_value_type(value_type: &ValueType) -> Option<Self> {
        match value_type {
            ValueType::String => Some(DbfFieldType::Character),
            ValueType::Int16 | ValueType::Int32 | ValueType::Int64 => Some(DbfFieldType::Integer),
            ValueType::Float64 => Some(DbfFieldType::Numeric),
            ValueType::Float32 => Some(DbfFieldType::Float),
            _ => None,
        }
    }
}

/// Characters needed for any 32-bit integer, sign included.
/// Wider integer fields read back as 64-bit columns.
pub const INT32_TEXT_WIDTH: usize = 11;
/// Characters needed for any 64-bit integer, sign included
pub const INT64_TEXT_WIDTH: usize = 20;

/// One field descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfField {
    pub name: String,
    pub field_type: DbfFieldType,
    pub width: u8,
    pub decimals: u8,
}

impl DbfField {
    fn from_bytes(bytes: &[u8; DESCRIPTOR_LEN]) -> Result<Self> {
        let name_end = bytes[..11].iter().position(|&b| b == 0).unwrap_or(11);
        let name = String::from_utf8_lossy(&bytes[..name_end]).trim().to_string();
        Ok(Self {
            name,
            field_type: DbfFieldType::from_code(bytes[11])?,
            width: bytes[16],
            decimals: bytes[17],
        })
    }

    fn to_bytes(&self) -> [u8; DESCRIPTOR_LEN] {
        let mut buf = [0u8; DESCRIPTOR_LEN];
        let name = truncate_bytes(&self.name, MAX_NAME_LEN);
        buf[..name.len()].copy_from_slice(name.as_bytes());
        buf[11] = self.field_type.code();
        buf[16] = self.width;
        buf[17] = self.decimals;
        buf
    }

    /// Column descriptor for this field
    pub fn to_column(&self) -> Column {
        let width = usize::from(self.width);
        let precision = (self.decimals > 0).then(|| usize::from(self.decimals));
        let value_type = match self.field_type {
            DbfFieldType::Character => ValueType::String,
            DbfFieldType::Numeric => ValueType::Float64,
            DbfFieldType::Float => ValueType::Float32,
            DbfFieldType::Integer if width > INT32_TEXT_WIDTH => ValueType::Int64,
            DbfFieldType::Integer => ValueType::Int32,
        };
        let mut column = Column::new(self.name.clone(), value_type).with_width(width);
        column.precision = precision;
        column
    }
}

/// Header metadata of a DBF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfHeader {
    pub version: u8,
    pub last_update: Option<NaiveDate>,
    pub row_count: u32,
    pub header_length: u16,
    pub record_length: u16,
    pub fields: Vec<DbfField>,
}

impl DbfHeader {
    /// Build a header for writing `fields` and `row_count` records
    pub fn new(fields: Vec<DbfField>, row_count: u32, last_update: NaiveDate) -> Result<Self> {
        let header_length = HEADER_PROLOG_LEN + DESCRIPTOR_LEN * fields.len() + 1;
        let record_length = 1 + fields.iter().map(|f| usize::from(f.width)).sum::<usize>();
        let too_big = |what: &str, n: usize| {
            TableError::InvalidArgument(format!("DBF {} of {} bytes exceeds the format limit", what, n))
        };
        Ok(Self {
            version: DBASE_III,
            last_update: Some(last_update),
            row_count,
            header_length: u16::try_from(header_length).map_err(|_| too_big("header", header_length))?,
            record_length: u16::try_from(record_length).map_err(|_| too_big("record", record_length))?,
            fields,
        })
    }

    /// Read the prolog and field descriptors, leaving `reader` after the terminator
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut prolog = [0u8; HEADER_PROLOG_LEN];
        reader.read_exact(&mut prolog).map_err(|e| truncated(e, "header"))?;

        let last_update = NaiveDate::from_ymd_opt(
            1900 + i32::from(prolog[1]),
            u32::from(prolog[2]),
            u32::from(prolog[3]),
        );
        let row_count = u32::from_le_bytes([prolog[4], prolog[5], prolog[6], prolog[7]]);
        let header_length = u16::from_le_bytes([prolog[8], prolog[9]]);
        let record_length = u16::from_le_bytes([prolog[10], prolog[11]]);

        let mut fields = Vec::new();
        let mut consumed = HEADER_PROLOG_LEN;
        loop {
            let mut first = [0u8; 1];
            reader.read_exact(&mut first).map_err(|e| truncated(e, "field descriptors"))?;
            consumed += 1;
            if first[0] == HEADER_TERMINATOR {
                break;
            }
            let mut descriptor = [0u8; DESCRIPTOR_LEN];
            descriptor[0] = first[0];
            reader
                .read_exact(&mut descriptor[1..])
                .map_err(|e| truncated(e, "field descriptors"))?;
            consumed += DESCRIPTOR_LEN - 1;
            fields.push(DbfField::from_bytes(&descriptor)?);
            if consumed >= usize::from(header_length) {
                break;
            }
        }

        let header = Self {
            version: prolog[0],
            last_update,
            row_count,
            header_length,
            record_length,
            fields,
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<()> {
        let expected = 1 + self.fields.iter().map(|f| usize::from(f.width)).sum::<usize>();
        if expected > usize::from(self.record_length) {
            return Err(TableError::format(format!(
                "DBF record length {} is shorter than its fields ({} bytes)",
                self.record_length, expected
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_PROLOG_LEN];
        buf[0] = self.version;
        if let Some(date) = self.last_update {
            buf[1] = u8::try_from(date.year() - 1900).unwrap_or(0);
            buf[2] = date.month() as u8;
            buf[3] = date.day() as u8;
        }
        buf[4..8].copy_from_slice(&self.row_count.to_le_bytes());
        buf[8..10].copy_from_slice(&self.header_length.to_le_bytes());
        buf[10..12].copy_from_slice(&self.record_length.to_le_bytes());
        for field in &self.fields {
            buf.extend_from_slice(&field.to_bytes());
        }
        buf.push(HEADER_TERMINATOR);
        buf
    }

    /// Byte offset of each field within a record, not counting the delete flag
    pub fn offsets(&self) -> Vec<usize> {
        self.fields
            .iter()
            .scan(0usize, |acc, f| {
                let offset = *acc;
                *acc += usize::from(f.width);
                Some(offset)
            })
            .collect()
    }

    pub fn columns(&self) -> Vec<Column> {
        self.fields.iter().map(DbfField::to_column).collect()
    }

    /// File position of one cell
    pub fn cell_position(&self, row: usize, offset: usize) -> u64 {
        usize::from(self.header_length) as u64
            + (row as u64) * u64::from(self.record_length)
            + offset as u64
            + 1
    }
}

fn truncated(e: std::io::Error, what: &str) -> TableError {
    if e.kind() == ErrorKind::UnexpectedEof {
        TableError::format(format!("DBF file truncated inside the {}", what))
    } else {
        TableError::Io(e)
    }
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// A decoded cell, with the raw text when a substitute value was stored
struct Decoded {
    value: CellValue,
    substituted: Option<String>,
}

fn decode_field(bytes: &[u8], column: &Column) -> Decoded {
    let text = String::from_utf8_lossy(bytes);
    if column.value_type == ValueType::String {
        let trimmed = text.trim_end_matches([' ', '\0']);
        let value = if trimmed.is_empty() {
            CellValue::Null
        } else {
            CellValue::String(trimmed.to_string())
        };
        return Decoded {
            value,
            substituted: None,
        };
    }

    let trimmed = text.trim_matches([' ', '\0']);
    match column.parse_text(trimmed) {
        Ok(value) => Decoded {
            value,
            substituted: None,
        },
        // Overflow markers such as "******" land here
        Err(_) => Decoded {
            value: zero_for(&column.value_type),
            substituted: Some(trimmed.to_string()),
        },
    }
}

fn zero_for(value_type: &ValueType) -> CellValue {
    match value_type {
        ValueType::Int16 => CellValue::Int16(0),
        ValueType::Int32 => CellValue::Int32(0),
        ValueType::Int64 => CellValue::Int64(0),
        ValueType::Float32 => CellValue::Float32(0.0),
        _ => CellValue::Float64(0.0),
    }
}

/// Seek-based cell reads against an open DBF file
#[derive(Debug)]
pub struct DbfCellSource {
    file: Mutex<File>,
    header: DbfHeader,
    offsets: Vec<usize>,
    logger: Logger,
}

impl DbfCellSource {
    pub fn open(path: &Path, logger: Logger) -> Result<Self> {
        let mut file = File::open(path)?;
        let header = DbfHeader::read_from(&mut file)?;
        let offsets = header.offsets();
        Ok(Self {
            file: Mutex::new(file),
            header,
            offsets,
            logger,
        })
    }

    pub fn header(&self) -> &DbfHeader {
        &self.header
    }
}

impl CellSource for DbfCellSource {
    fn row_count(&self) -> usize {
        self.header.row_count as usize
    }

    fn read_cell(&self, row: usize, column: usize, descriptor: &Column) -> Result<CellValue> {
        let field = self
            .header
            .fields
            .get(column)
            .ok_or_else(|| TableError::not_found(format!("DBF field {}", column)))?;
        let position = self.header.cell_position(row, self.offsets[column]);
        let mut buf = vec![0u8; usize::from(field.width)];
        {
            let mut file = self
                .file
                .lock()
                .map_err(|_| TableError::Io(std::io::Error::other("DBF file handle poisoned")))?;
            file.seek(SeekFrom::Start(position))?;
            file.read_exact(&mut buf).map_err(|e| truncated(e, "records"))?;
        }
        let decoded = decode_field(&buf, descriptor);
        if let Some(raw) = decoded.substituted {
            self.logger.warn(
                ROUTINE,
                format!(
                    "row {}, field '{}': unreadable numeric text '{}' read as {}",
                    row, descriptor.name, raw, decoded.value
                ),
            );
        }
        Ok(decoded.value)
    }
}

/// Read a DBF file into a table
pub fn read_dbf(path: &Path, mode: DbfReadMode, logger: &Logger) -> Result<Table> {
    let identifier = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    if mode == DbfReadMode::OnTheFly {
        let source = DbfCellSource::open(path, logger.clone())?;
        let columns = source.header().columns();
        logger.info(
            ROUTINE,
            format!("opened {} on the fly ({} rows)", path.display(), source.row_count()),
        );
        return Ok(Table::new(columns)
            .with_identifier(identifier)
            .with_logger(logger.clone())
            .with_cell_source(Arc::new(source)));
    }

    let file = File::open(path).map_err(|e| {
        logger.warn(ROUTINE, format!("cannot open {}: {}", path.display(), e));
        e
    })?;
    let mut reader = BufReader::new(file);
    let mut table = read_records(&mut reader, logger)?;
    table.set_identifier(identifier);
    logger.info(
        ROUTINE,
        format!("read {} ({} rows x {} columns)", path.display(), table.row_count(), table.column_count()),
    );
    Ok(table)
}

/// Read header and every live record from a DBF stream
pub fn read_records<R: Read + Seek>(reader: &mut R, logger: &Logger) -> Result<Table> {
    let header = DbfHeader::read_from(reader)?;
    let columns = header.columns();
    let offsets = header.offsets();
    let mut table = Table::new(columns.clone()).with_logger(logger.clone());

    reader.seek(SeekFrom::Start(u64::from(header.header_length)))?;
    let mut record = vec![0u8; usize::from(header.record_length)];
    for record_idx in 0..header.row_count as usize {
        match reader.read_exact(&mut record) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                logger.warn(
                    ROUTINE,
                    format!(
                        "file ends after {} of {} records",
                        record_idx, header.row_count
                    ),
                );
                break;
            }
            Err(e) => return Err(e.into()),
        }
        match record[0] {
            EOF_MARKER => break,
            DELETED_RECORD => continue,
            _ => {}
        }

        let row_idx = table.row_count();
        let mut cells = Vec::with_capacity(columns.len());
        for (col_idx, (column, field)) in columns.iter().zip(&header.fields).enumerate() {
            let start = offsets[col_idx] + 1;
            let bytes = &record[start..start + usize::from(field.width)];
            let decoded = decode_field(bytes, column);
            if let Some(raw) = decoded.substituted {
                logger.warn(
                    ROUTINE,
                    format!(
                        "record {}, field '{}': unreadable numeric text '{}' read as {}",
                        record_idx + 1,
                        column.name,
                        raw,
                        decoded.value
                    ),
                );
                table.record_substitution(Substitution {
                    row: row_idx,
                    column: col_idx,
                    raw,
                    value: decoded.value.clone(),
                });
            }
            cells.push(decoded.value);
        }
        table.add_row(Row::new(cells).with_source_line(record_idx + 1))?;
    }

    logger.debug(
        ROUTINE,
        format!("read {} rows x {} fields", table.row_count(), table.column_count()),
    );
    Ok(table)
}

/// Parser for dBase files
#[derive(Debug, Clone, Copy, Default)]
pub struct DbfParser {
    mode: DbfReadMode,
}

impl DbfParser {
    pub fn new(mode: DbfReadMode) -> Self {
        Self { mode }
    }
}

impl Parser for DbfParser {
    fn parse(&self, path: &Path, logger: &Logger) -> Result<Table> {
        read_dbf(path, self.mode, logger)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        ext.eq_ignore_ascii_case("dbf")
    }
}
