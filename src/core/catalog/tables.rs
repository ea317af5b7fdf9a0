//! Table-level catalog rows (`_meta/tables.csv`)

use super::{field_datetime, field_parsed, field_text, optional, required_column, required_text};
use crate::codec::{format_datetime, CsvRecordReader, Value};
use crate::error::Result;
use chrono::NaiveDateTime;
use serde::Serialize;

pub(crate) const HEADER: [&str; 7] = [
    "filename",
    "bytes",
    "rows",
    "columns",
    "description",
    "published",
    "source",
];

/// One row per table member
///
/// Every field except `filename` is optional; an absent value means
/// "unknown", never zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRecord {
    /// Member filename, extension included
    pub filename: String,

    /// Byte length of the CSV stream
    pub byte_length: Option<u64>,

    /// Records written, header excluded
    pub row_count: Option<u64>,

    pub column_count: Option<usize>,
    pub description: Option<String>,
    pub published: Option<NaiveDateTime>,
    pub source: Option<String>,
}

impl TableRecord {
    /// A record with only the filename known
    pub fn unknown(filename: impl Into<String>) -> Self {
        TableRecord {
            filename: filename.into(),
            byte_length: None,
            row_count: None,
            column_count: None,
            description: None,
            published: None,
            source: None,
        }
    }

    /// Shape measured while writing a table
    pub fn measured(filename: impl Into<String>, bytes: u64, rows: u64, columns: usize) -> Self {
        TableRecord {
            byte_length: Some(bytes),
            row_count: Some(rows),
            column_count: Some(columns),
            ..Self::unknown(filename)
        }
    }

    pub(crate) fn values(&self) -> Vec<Value> {
        vec![
            Value::String(self.filename.clone()),
            optional(self.byte_length),
            optional(self.row_count),
            optional(self.column_count),
            optional(self.description.as_ref()),
            optional(self.published.map(format_datetime)),
            optional(self.source.as_ref()),
        ]
    }
}

/// Parse a tables catalog stream
///
/// Only the `filename` column is required; other recognized columns that are
/// missing read as absent for every row.
pub(crate) fn parse(bytes: &[u8]) -> Result<Vec<TableRecord>> {
    let mut reader = CsvRecordReader::new(bytes)?;

    let filename = required_column(&reader, "filename")?;
    let byte_length = reader.get_ordinal("bytes");
    let rows = reader.get_ordinal("rows");
    let columns = reader.get_ordinal("columns");
    let description = reader.get_ordinal("description");
    let published = reader.get_ordinal("published");
    let source = reader.get_ordinal("source");

    let mut out = Vec::new();
    while reader.read()? {
        out.push(TableRecord {
            filename: required_text(&reader, filename, "filename")?,
            byte_length: field_parsed(&reader, byte_length, "bytes", "a byte count")?,
            row_count: field_parsed(&reader, rows, "rows", "a row count")?,
            column_count: field_parsed(&reader, columns, "columns", "a column count")?,
            description: field_text(&reader, description),
            published: field_datetime(&reader, published, "published")?,
            source: field_text(&reader, source),
        });
    }
    Ok(out)
}
