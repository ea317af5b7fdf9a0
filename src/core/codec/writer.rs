//! CSV record writer

use super::schema::Value;
use super::RecordSource;
use crate::error::{CsvzError, Result};
use std::io::{self, Write};

/// Counts bytes passed through to the inner writer
pub struct CountingWriter<W> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        CountingWriter { inner, bytes: 0 }
    }

    /// Bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes header-plus-rows CSV with CRLF record terminators
pub struct CsvRecordWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvRecordWriter<W> {
    pub fn new(inner: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(inner);
        CsvRecordWriter { writer }
    }

    pub fn write_header<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.writer.write_record(names)?;
        Ok(())
    }

    /// Write one record; `Null` fields are written empty
    pub fn write_values(&mut self, values: &[Value]) -> Result<()> {
        self.writer
            .write_record(values.iter().map(|v| v.to_field().into_owned()))?;
        Ok(())
    }

    /// Stream a whole source: header from its declared columns, then every record
    ///
    /// Returns the number of records written.
    pub fn write_source(&mut self, source: &mut dyn RecordSource) -> Result<u64> {
        let header: Vec<String> = source.columns().iter().map(|c| c.name.clone()).collect();
        self.write_header(&header)?;

        let mut count = 0u64;
        while let Some(values) = source.next_record()? {
            self.write_values(&values)?;
            count += 1;
        }
        Ok(count)
    }

    /// Flush buffered records and return the inner writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| CsvzError::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ColumnSchema, DataType, MemorySource};

    #[test]
    fn test_counting_writer() {
        let mut w = CountingWriter::new(Vec::new());
        w.write_all(b"hello").unwrap();
        w.write_all(b", world").unwrap();
        assert_eq!(w.bytes_written(), 12);
        assert_eq!(w.into_inner(), b"hello, world");
    }

    #[test]
    fn test_writes_crlf_and_empty_nulls() {
        let mut writer = CsvRecordWriter::new(Vec::new());
        writer.write_header(["a", "b"]).unwrap();
        writer
            .write_values(&[Value::Int32(1), Value::Null])
            .unwrap();
        let out = writer.into_inner().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a,b\r\n1,\r\n");
    }

    #[test]
    fn test_write_source_counts_records() {
        let mut source = MemorySource::new(
            vec![
                ColumnSchema::new("k", DataType::String),
                ColumnSchema::new("v", DataType::Int64),
            ],
            vec![
                vec!["x".into(), 1i64.into()],
                vec!["y, z".into(), Value::Null],
            ],
        );
        let mut writer = CsvRecordWriter::new(Vec::new());
        let n = writer.write_source(&mut source).unwrap();
        assert_eq!(n, 2);
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "k,v\r\nx,1\r\n\"y, z\",\r\n");
    }
}
