//! Tabular codec
//!
//! Reads and writes table members as header-plus-rows CSV with a declared
//! column schema. An empty field always means "absent".

mod reader;
mod schema;
mod writer;

pub use reader::CsvRecordReader;
pub use schema::{ColumnSchema, DataType, Value};
pub use writer::{CountingWriter, CsvRecordWriter};

pub(crate) use schema::{format_datetime, parse_bool, parse_datetime};

use crate::error::Result;

/// A readable sequence of typed records with a declared schema
///
/// Implemented by [`CsvRecordReader`] and [`MemorySource`]; any implementation
/// can be handed to `Entry::write_data`.
pub trait RecordSource {
    /// Declared columns, in ordinal order
    fn columns(&self) -> &[ColumnSchema];

    /// Next record, or `None` at the end
    fn next_record(&mut self) -> Result<Option<Vec<Value>>>;
}

/// In-memory record source
///
/// Column ordinals are assigned from their position.
///
/// # Examples
///
/// ```
/// use csvz::codec::{ColumnSchema, DataType, MemorySource, RecordSource, Value};
///
/// let mut source = MemorySource::new(
///     vec![ColumnSchema::new("n", DataType::Int32)],
///     vec![vec![Value::Int32(1)], vec![Value::Int32(2)]],
/// );
/// assert_eq!(source.columns()[0].ordinal, 0);
/// assert!(source.next_record().unwrap().is_some());
/// ```
pub struct MemorySource {
    columns: Vec<ColumnSchema>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl MemorySource {
    pub fn new(columns: Vec<ColumnSchema>, rows: Vec<Vec<Value>>) -> Self {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_ordinal(i))
            .collect();
        MemorySource {
            columns,
            rows: rows.into_iter(),
        }
    }
}

impl RecordSource for MemorySource {
    fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    fn next_record(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.next())
    }
}
