//! Typed CSV record reader

use super::schema::{parse_bool, parse_date, parse_datetime, ColumnSchema, DataType, Value};
use super::RecordSource;
use crate::error::{CsvzError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Read;

/// Reads a header-plus-rows CSV stream as typed records
///
/// Without a schema hint every column reads as `string`. With a hint, columns
/// are matched by case-insensitive name and parsed as their declared type.
///
/// Rows are read leniently: a short row pads its missing fields with `Null`,
/// and fields beyond the header are ignored.
///
/// # Examples
///
/// ```
/// use csvz::codec::CsvRecordReader;
///
/// # fn main() -> csvz::Result<()> {
/// let mut reader = CsvRecordReader::new("Code,Name\r\nOR,Oregon\r\n".as_bytes())?;
/// let name = reader.get_ordinal("name").unwrap();
/// assert!(reader.read()?);
/// assert_eq!(reader.get_str(name), Some("Oregon"));
/// assert!(!reader.read()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CsvRecordReader<R> {
    reader: csv::Reader<R>,
    columns: Vec<ColumnSchema>,
    record: csv::StringRecord,
    current: Vec<Value>,
    rows_read: u64,
}

impl<R: Read> CsvRecordReader<R> {
    /// Open a stream with every column read as `string`
    pub fn new(reader: R) -> Result<Self> {
        Self::with_schema(reader, None)
    }

    /// Open a stream with an optional schema hint
    pub fn with_schema(reader: R, hint: Option<&[ColumnSchema]>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let columns = headers
            .iter()
            .enumerate()
            .map(|(ordinal, name)| {
                let hinted = hint.and_then(|h| h.iter().find(|c| c.name.eq_ignore_ascii_case(name)));
                match hinted {
                    Some(col) => ColumnSchema {
                        name: name.to_string(),
                        ordinal,
                        ..col.clone()
                    },
                    None => ColumnSchema::new(name, DataType::String).with_ordinal(ordinal),
                }
            })
            .collect();

        Ok(CsvRecordReader {
            reader,
            columns,
            record: csv::StringRecord::new(),
            current: Vec::new(),
            rows_read: 0,
        })
    }

    /// Declared columns, in header order
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    /// Advance to the next record; false at end of stream
    pub fn read(&mut self) -> Result<bool> {
        if !self.reader.read_record(&mut self.record)? {
            self.current.clear();
            return Ok(false);
        }
        self.rows_read += 1;

        self.current.clear();
        for col in &self.columns {
            let text = self.record.get(col.ordinal).unwrap_or("");
            let value = match Value::parse(text, col.data_type) {
                Ok(v) => v,
                Err(expected) => {
                    return Err(CsvzError::FieldParse {
                        row: self.rows_read,
                        column: col.name.clone(),
                        value: text.to_string(),
                        expected,
                    })
                }
            };
            self.current.push(value);
        }
        Ok(true)
    }

    /// Number of records read so far (1-based index of the current record)
    pub fn row_number(&self) -> u64 {
        self.rows_read
    }

    /// Resolve a column name, case-insensitively
    pub fn get_ordinal(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// True if the field is empty, missing from a short row, or out of range
    pub fn is_absent(&self, ordinal: usize) -> bool {
        self.current.get(ordinal).map_or(true, Value::is_null)
    }

    pub fn value(&self, ordinal: usize) -> Option<&Value> {
        self.current.get(ordinal).filter(|v| !v.is_null())
    }

    /// All fields of the current record
    pub fn values(&self) -> &[Value] {
        &self.current
    }

    /// Raw text of a field, whatever its declared type
    pub fn get_str(&self, ordinal: usize) -> Option<&str> {
        if self.is_absent(ordinal) {
            return None;
        }
        self.record.get(ordinal)
    }

    pub fn get_bool(&self, ordinal: usize) -> Option<bool> {
        match self.value(ordinal)? {
            Value::Boolean(b) => Some(*b),
            Value::String(s) => parse_bool(s),
            _ => None,
        }
    }

    pub fn get_i32(&self, ordinal: usize) -> Option<i32> {
        match self.value(ordinal)? {
            Value::Int32(v) => Some(*v),
            Value::Int64(v) => i32::try_from(*v).ok(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_i64(&self, ordinal: usize) -> Option<i64> {
        match self.value(ordinal)? {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_f64(&self, ordinal: usize) -> Option<f64> {
        match self.value(ordinal)? {
            Value::Double(v) => Some(*v),
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_date(&self, ordinal: usize) -> Option<NaiveDate> {
        match self.value(ordinal)? {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            Value::String(s) => parse_date(s),
            _ => None,
        }
    }

    pub fn get_datetime(&self, ordinal: usize) -> Option<NaiveDateTime> {
        match self.value(ordinal)? {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::String(s) => parse_datetime(s),
            _ => None,
        }
    }
}

impl<R: Read> RecordSource for CsvRecordReader<R> {
    fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    fn next_record(&mut self) -> Result<Option<Vec<Value>>> {
        if self.read()? {
            Ok(Some(self.current.clone()))
        } else {
            Ok(None)
        }
    }
}
