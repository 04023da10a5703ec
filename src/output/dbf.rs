//! dBase (DBF) writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{Local, NaiveDate};

use crate::error::{Result, TableError};
use crate::model::{format_float, CellValue, Column, Table, ValueType};
use crate::parser::dbf::{
    truncate_bytes, DbfField, DbfFieldType, DbfHeader, EOF_MARKER, INT64_TEXT_WIDTH, LIVE_RECORD,
    MAX_NAME_LEN,
};

use super::TableWriter;

/// Width used for columns that declare none
pub const DEFAULT_FIELD_WIDTH: usize = 32;
const MAX_FIELD_WIDTH: usize = 255;

/// Writer for dBase files
#[derive(Debug, Clone, Default)]
pub struct DbfWriter {
    /// Date stamped into the header; today when unset
    last_update: Option<NaiveDate>,
}

impl DbfWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_last_update(mut self, date: NaiveDate) -> Self {
        self.last_update = Some(date);
        self
    }

    /// Field descriptors for a table; fails on the first column the format cannot hold
    pub fn fields_for(table: &Table) -> Result<Vec<DbfField>> {
        table
            .columns()
            .iter()
            .enumerate()
            .map(|(col, column)| {
                let precision = match column.precision {
                    Some(p) => p,
                    None if column.value_type.is_float() => observed_decimals(table, col)?,
                    None => 0,
                };
                field_for(column, precision)
            })
            .collect()
    }
}

/// Most fractional digits any value in a float column renders with
fn observed_decimals(table: &Table, col: usize) -> Result<usize> {
    let mut decimals = 0;
    for row in 0..table.row_count() {
        let text = match table.get_field_value(row, col)? {
            CellValue::Float32(f) if f.is_finite() => f.to_string(),
            value => match value.as_f64() {
                Some(f) if f.is_finite() => f.to_string(),
                _ => continue,
            },
        };
        if let Some((_, fraction)) = text.split_once('.') {
            decimals = decimals.max(fraction.len());
        }
    }
    Ok(decimals)
}

fn field_for(column: &Column, precision: usize) -> Result<DbfField> {
    let field_type = DbfFieldType::for_value_type(&column.value_type).ok_or_else(|| {
        TableError::UnsupportedType {
            column: column.name.clone(),
            value_type: column.value_type.to_string(),
        }
    })?;
    let mut width = column
        .width
        .filter(|&w| w > 0)
        .unwrap_or(DEFAULT_FIELD_WIDTH)
        .min(MAX_FIELD_WIDTH);
    if column.value_type == ValueType::Int64 {
        width = width.max(INT64_TEXT_WIDTH);
    }
    let decimals = match field_type {
        DbfFieldType::Numeric | DbfFieldType::Float => {
            precision.min(width.saturating_sub(2))
        }
        _ => 0,
    };
    Ok(DbfField {
        name: truncate_bytes(&column.name, MAX_NAME_LEN).to_string(),
        field_type,
        width: width as u8,
        decimals: decimals as u8,
    })
}

/// Fixed-width bytes for one cell
fn encode_cell(value: &CellValue, column: &Column, field: &DbfField) -> Result<Vec<u8>> {
    let width = usize::from(field.width);
    let text = match field.field_type {
        DbfFieldType::Character => {
            let text = column.format_value(value)?;
            let mut bytes = truncate_bytes(&text, width).as_bytes().to_vec();
            bytes.resize(width, b' ');
            return Ok(bytes);
        }
        DbfFieldType::Integer => column.format_value(value)?,
        DbfFieldType::Numeric | DbfFieldType::Float => {
            let value = column.coerce(value.clone())?;
            match value.as_f64() {
                Some(f) if !f.is_nan() => format_float(f, Some(usize::from(field.decimals)), ""),
                _ => String::new(),
            }
        }
    };
    // Numbers are right-justified; text too long for the field is cut
    let text = truncate_bytes(&text, width);
    Ok(format!("{:>width$}", text, width = width).into_bytes())
}

impl TableWriter for DbfWriter {
    fn write_to(&self, table: &Table, writer: &mut dyn Write) -> Result<()> {
        let fields = Self::fields_for(table)?;
        let row_count = u32::try_from(table.row_count()).map_err(|_| {
            TableError::InvalidArgument(format!("{} rows exceed the DBF limit", table.row_count()))
        })?;
        let date = self.last_update.unwrap_or_else(|| Local::now().date_naive());
        let header = DbfHeader::new(fields, row_count, date)?;
        writer.write_all(&header.to_bytes())?;

        let mut record = Vec::with_capacity(usize::from(header.record_length));
        for row in 0..table.row_count() {
            record.clear();
            record.push(LIVE_RECORD);
            for (col, (column, field)) in table.columns().iter().zip(&header.fields).enumerate() {
                let value = table.get_field_value(row, col)?;
                record.extend_from_slice(&encode_cell(&value, column, field)?);
            }
            writer.write_all(&record)?;
        }
        writer.write_all(&[EOF_MARKER])?;
        Ok(())
    }

    fn write(&self, table: &Table, path: &Path) -> Result<()> {
        // Validate before creating the file so a bad schema leaves nothing behind
        Self::fields_for(table)?;
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(table, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn supports_extension(&self, ext: &str) -> bool {
        ext.eq_ignore_ascii_case("dbf")
    }
}
