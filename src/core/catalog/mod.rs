//! Metadata catalog
//!
//! Two denormalized tables persisted inside the archive:
//!
//! - `_meta/tables.csv`: one [`TableRecord`] per table member
//! - `_meta/columns.csv`: one [`ColumnRecord`] per column per table
//!
//! Loading is availability-first: a missing or unreadable catalog member
//! leaves that catalog empty and is reported through [`LoadStatus`], never as
//! an error. Writing always replaces both members in full, with rows in a fixed
//! order so that unchanged state serializes to identical bytes.

mod columns;
mod status;
mod tables;

pub use columns::ColumnRecord;
pub use status::{CatalogKind, CatalogObserver, CatalogStatus, Conformance, LoadStatus, TracingObserver};
pub use tables::TableRecord;

use crate::archive::{Archive, MemberKind, MemberWriter};
use crate::codec::{parse_bool, parse_datetime, CsvRecordReader, CsvRecordWriter, Value};
use crate::error::{CsvzError, Result};
use crate::naming::{fold, normalize_name};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};
use std::str::FromStr;
use tracing::{debug, warn};

/// Member path of the tables catalog
pub const TABLES_PATH: &str = "_meta/tables.csv";

/// Member path of the columns catalog
pub const COLUMNS_PATH: &str = "_meta/columns.csv";

/// True for the two reserved catalog members, matched case-insensitively
///
/// Other members under `_meta/` are not catalog members and are left alone.
pub fn is_catalog_member(name: &str) -> bool {
    name.eq_ignore_ascii_case(TABLES_PATH) || name.eq_ignore_ascii_case(COLUMNS_PATH)
}

/// In-memory catalog state
///
/// Tables are keyed by case-folded filename; columns by (case-folded
/// filename, ordinal). A later row for the same key replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    tables: BTreeMap<String, TableRecord>,
    columns: BTreeMap<(String, usize), ColumnRecord>,
}

fn table_key(filename: &str) -> String {
    fold(&normalize_name(filename))
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load both catalog members, reporting each outcome to `observer`
    pub fn load(archive: &mut Archive, observer: &dyn CatalogObserver) -> (Self, CatalogStatus) {
        let mut catalog = Catalog::new();

        let (tables, tables_status) = load_member(archive, TABLES_PATH, tables::parse);
        observer.catalog_loaded(CatalogKind::Tables, &tables_status);
        for record in tables {
            catalog.insert_table(record);
        }

        let (columns, columns_status) = load_member(archive, COLUMNS_PATH, columns::parse);
        observer.catalog_loaded(CatalogKind::Columns, &columns_status);
        for record in columns {
            catalog.insert_column(record);
        }

        let status = CatalogStatus {
            tables: tables_status,
            columns: columns_status,
        };
        (catalog, status)
    }

    fn insert_table(&mut self, record: TableRecord) {
        let key = table_key(&record.filename);
        if self.tables.insert(key, record).is_some() {
            warn!("Duplicate table catalog row; keeping the last one");
        }
    }

    fn insert_column(&mut self, record: ColumnRecord) {
        let key = (table_key(&record.filename), record.ordinal);
        if let Some(prev) = self.columns.insert(key, record) {
            warn!(
                "Duplicate column catalog row for {} ordinal {}; keeping the last one",
                prev.filename, prev.ordinal
            );
        }
    }

    /// Drop rows for tables that have no data member
    pub fn retain_tables(&mut self, present: &HashSet<String>) {
        let before = (self.tables.len(), self.columns.len());
        self.tables.retain(|key, _| present.contains(key));
        self.columns.retain(|(key, _), _| present.contains(key));

        let dropped = (
            before.0 - self.tables.len(),
            before.1 - self.columns.len(),
        );
        if dropped != (0, 0) {
            debug!(
                "Dropped {} table rows and {} column rows with no data member",
                dropped.0, dropped.1
            );
        }
    }

    /// Table row by case-folded key
    pub fn table(&self, key: &str) -> Option<&TableRecord> {
        self.tables.get(key)
    }

    /// Column rows for a table, ordered by ordinal
    pub fn columns_for(&self, key: &str) -> Vec<&ColumnRecord> {
        self.columns
            .range((key.to_string(), 0)..=(key.to_string(), usize::MAX))
            .map(|(_, record)| record)
            .collect()
    }

    pub fn column(&self, key: &str, ordinal: usize) -> Option<&ColumnRecord> {
        self.columns.get(&(key.to_string(), ordinal))
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Replace everything known about a table
    pub fn put_table(&mut self, record: TableRecord, columns: Vec<ColumnRecord>) {
        let key = table_key(&record.filename);
        self.remove_table(&key);
        self.tables.insert(key.clone(), record);
        for column in columns {
            self.columns.insert((key.clone(), column.ordinal), column);
        }
    }

    /// Replace one table row, leaving its columns alone
    pub fn replace_table_record(&mut self, record: TableRecord) {
        self.tables.insert(table_key(&record.filename), record);
    }

    /// Replace one column row
    pub fn replace_column(&mut self, record: ColumnRecord) {
        self.columns
            .insert((table_key(&record.filename), record.ordinal), record);
    }

    /// Remove a table row and every column row with the same key
    ///
    /// Returns true if anything was removed.
    pub fn remove_table(&mut self, key: &str) -> bool {
        let had_table = self.tables.remove(key).is_some();
        let before = self.columns.len();
        self.columns.retain(|(k, _), _| k != key);
        had_table || self.columns.len() != before
    }

    /// Serialize the tables catalog
    pub fn tables_csv(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_tables(&mut buf)?;
        Ok(buf)
    }

    /// Serialize the columns catalog
    pub fn columns_csv(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_columns(&mut buf)?;
        Ok(buf)
    }

    fn write_tables(&self, out: &mut dyn Write) -> Result<()> {
        let mut writer = CsvRecordWriter::new(out);
        writer.write_header(tables::HEADER)?;
        for record in self.tables.values() {
            writer.write_values(&record.values())?;
        }
        writer.into_inner()?;
        Ok(())
    }

    fn write_columns(&self, out: &mut dyn Write) -> Result<()> {
        let mut writer = CsvRecordWriter::new(out);
        writer.write_header(columns::HEADER)?;
        for record in self.columns.values() {
            writer.write_values(&record.values())?;
        }
        writer.into_inner()?;
        Ok(())
    }

    /// Write both catalog members during an archive rebuild
    pub fn write_members(&self, members: &mut MemberWriter) -> Result<()> {
        members.write_member(TABLES_PATH, MemberKind::Catalog, |w| self.write_tables(w))?;
        members.write_member(COLUMNS_PATH, MemberKind::Catalog, |w| self.write_columns(w))?;
        debug!(
            "Wrote catalog: {} tables, {} columns",
            self.tables.len(),
            self.columns.len()
        );
        Ok(())
    }
}

fn load_member<T>(
    archive: &mut Archive,
    path: &str,
    parse: fn(&[u8]) -> Result<Vec<T>>,
) -> (Vec<T>, LoadStatus) {
    let Some(member) = archive.find_member(path) else {
        return (Vec::new(), LoadStatus::Absent);
    };
    let bytes = match archive.read_member(&member) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return (Vec::new(), LoadStatus::Absent),
        Err(e) => {
            return (
                Vec::new(),
                LoadStatus::Recovered {
                    reason: e.to_string(),
                },
            )
        }
    };

    match parse(&bytes) {
        Ok(rows) => {
            let status = LoadStatus::Loaded { rows: rows.len() };
            (rows, status)
        }
        Err(e) => (
            Vec::new(),
            LoadStatus::Recovered {
                reason: e.to_string(),
            },
        ),
    }
}

pub(crate) fn optional<T: ToString>(value: Option<T>) -> Value {
    match value {
        Some(v) => Value::String(v.to_string()),
        None => Value::Null,
    }
}

pub(crate) fn required_column<R: Read>(reader: &CsvRecordReader<R>, name: &str) -> Result<usize> {
    reader
        .get_ordinal(name)
        .ok_or_else(|| CsvzError::MalformedCatalog(format!("missing '{}' column", name)))
}

pub(crate) fn field_text<R: Read>(reader: &CsvRecordReader<R>, ordinal: Option<usize>) -> Option<String> {
    ordinal
        .and_then(|o| reader.get_str(o))
        .map(str::to_string)
}

pub(crate) fn required_text<R: Read>(
    reader: &CsvRecordReader<R>,
    ordinal: usize,
    column: &str,
) -> Result<String> {
    field_text(reader, Some(ordinal)).ok_or_else(|| {
        CsvzError::MalformedCatalog(format!(
            "row {} has no {}",
            reader.row_number(),
            column
        ))
    })
}

fn parse_with<R: Read, T>(
    reader: &CsvRecordReader<R>,
    ordinal: Option<usize>,
    column: &str,
    expected: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>> {
    let Some(text) = ordinal.and_then(|o| reader.get_str(o)) else {
        return Ok(None);
    };
    match parse(text) {
        Some(v) => Ok(Some(v)),
        None => Err(CsvzError::FieldParse {
            row: reader.row_number(),
            column: column.to_string(),
            value: text.to_string(),
            expected,
        }),
    }
}

pub(crate) fn field_parsed<R: Read, T: FromStr>(
    reader: &CsvRecordReader<R>,
    ordinal: Option<usize>,
    column: &str,
    expected: &'static str,
) -> Result<Option<T>> {
    parse_with(reader, ordinal, column, expected, |s| s.trim().parse().ok())
}

pub(crate) fn field_bool<R: Read>(
    reader: &CsvRecordReader<R>,
    ordinal: Option<usize>,
    column: &str,
) -> Result<Option<bool>> {
    parse_with(reader, ordinal, column, "a boolean", parse_bool)
}

pub(crate) fn field_datetime<R: Read>(
    reader: &CsvRecordReader<R>,
    ordinal: Option<usize>,
    column: &str,
) -> Result<Option<NaiveDateTime>> {
    parse_with(reader, ordinal, column, "a date", parse_datetime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ColumnSchema, DataType};

    fn sample() -> Catalog {
        let mut catalog = Catalog::new();
        for (name, rows) in [("zeta.csv", 1), ("Alpha.csv", 2)] {
            let columns = vec![
                ColumnRecord::from_schema(name, &ColumnSchema::new("b", DataType::Int32).with_ordinal(1)),
                ColumnRecord::from_schema(name, &ColumnSchema::new("a", DataType::String).with_ordinal(0)),
            ];
            catalog.put_table(TableRecord::measured(name, 10, rows, 2), columns);
        }
        catalog
    }

    #[test]
    fn test_serialization_is_sorted() {
        let catalog = sample();
        let tables = String::from_utf8(catalog.tables_csv().unwrap()).unwrap();
        assert_eq!(
            tables,
            "filename,bytes,rows,columns,description,published,source\r\n\
             Alpha.csv,10,2,2,,,\r\n\
             zeta.csv,10,1,2,,,\r\n"
        );

        let columns = String::from_utf8(catalog.columns_csv().unwrap()).unwrap();
        let lines: Vec<&str> = columns.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("Alpha.csv,a,0,string"));
        assert!(lines[2].starts_with("Alpha.csv,b,1,int32"));
        assert!(lines[3].starts_with("zeta.csv,a,0,"));
    }

    #[test]
    fn test_serialization_is_byte_stable() {
        let catalog = sample();
        assert_eq!(catalog.tables_csv().unwrap(), catalog.tables_csv().unwrap());
        assert_eq!(catalog.columns_csv().unwrap(), catalog.columns_csv().unwrap());
    }

    #[test]
    fn test_parse_of_serialized_matches() {
        let catalog = sample();
        let tables = tables::parse(&catalog.tables_csv().unwrap()).unwrap();
        let columns = columns::parse(&catalog.columns_csv().unwrap()).unwrap();

        let mut reloaded = Catalog::new();
        tables.into_iter().for_each(|t| reloaded.insert_table(t));
        columns.into_iter().for_each(|c| reloaded.insert_column(c));
        assert_eq!(reloaded, catalog);
    }

    #[test]
    fn test_remove_table_removes_columns() {
        let mut catalog = sample();
        assert!(catalog.remove_table("alpha.csv"));
        assert!(catalog.table("alpha.csv").is_none());
        assert!(catalog.columns_for("alpha.csv").is_empty());
        assert_eq!(catalog.columns_for("zeta.csv").len(), 2);
        assert!(!catalog.remove_table("alpha.csv"));
    }

    #[test]
    fn test_duplicate_ordinal_last_wins() {
        let mut catalog = Catalog::new();
        catalog.insert_column(ColumnRecord::from_schema("t.csv", &ColumnSchema::new("first", DataType::String)));
        catalog.insert_column(ColumnRecord::from_schema("T.CSV", &ColumnSchema::new("second", DataType::String)));
        let cols = catalog.columns_for("t.csv");
        assert_eq!(cols.len(), 1);
        assert_eq!(cols[0].column_name, "second");
    }

    #[test]
    fn test_retain_tables() {
        let mut catalog = sample();
        let present: HashSet<String> = ["zeta.csv".to_string()].into_iter().collect();
        catalog.retain_tables(&present);
        assert_eq!(catalog.table_count(), 1);
        assert_eq!(catalog.column_count(), 2);
    }

    #[test]
    fn test_is_catalog_member() {
        assert!(is_catalog_member("_meta/tables.csv"));
        assert!(is_catalog_member("_META/Columns.CSV"));
        assert!(!is_catalog_member("_meta/relations.csv"));
        assert!(!is_catalog_member("tables.csv"));
    }

    #[test]
    fn test_keys_without_extension_are_normalized() {
        let mut catalog = Catalog::new();
        catalog.insert_table(TableRecord::unknown("States"));
        assert!(catalog.table("states.csv").is_some());
    }
}
