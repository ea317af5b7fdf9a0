//! Per-table handle

use crate::archive::MemberKind;
use crate::catalog::{is_catalog_member, Catalog, ColumnRecord, TableRecord};
use crate::codec::{ColumnSchema, CountingWriter, CsvRecordReader, CsvRecordWriter, RecordSource};
use crate::error::{CsvzError, Result};
use crate::naming::TableName;
use crate::Package;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// Lifecycle of an [`Entry`] handle
///
/// `Unmaterialized -> Materialized` on `write_data`, `Materialized -> Deleted`
/// on `delete`, and a `delete` with nothing to delete resets the handle to
/// `Unmaterialized`. A `Deleted` handle may write fresh data under its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Unmaterialized,
    Materialized,
    Deleted,
}

/// Informational fields of a table's catalog row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub description: Option<String>,
    pub published: Option<NaiveDateTime>,
    pub source: Option<String>,
}

/// Informational fields of a column's catalog row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub description: Option<String>,
    pub units: Option<String>,
    pub published: Option<NaiveDateTime>,
    pub source: Option<String>,
}

/// A named table inside a [`Package`]
///
/// Metadata accessors read the package's catalog; they report `None` when the
/// catalog has no row for this table ("unknown", not zero).
///
/// # Examples
///
/// ```rust,no_run
/// use csvz::{codec::CsvRecordReader, Package};
///
/// # fn main() -> csvz::Result<()> {
/// let package = Package::create("states.csvz")?;
/// let mut entry = package.create_entry("states")?;
/// let mut source = CsvRecordReader::new("Code,Name\r\nOR,Oregon\r\n".as_bytes())?;
/// entry.write_data(&mut source)?;
///
/// assert_eq!(entry.name(), "states");
/// assert_eq!(entry.row_count(), Some(1));
/// # Ok(())
/// # }
/// ```
pub struct Entry<'p> {
    package: &'p Package,
    name: TableName,
    state: EntryState,
}

impl<'p> Entry<'p> {
    pub(crate) fn new(package: &'p Package, name: TableName, state: EntryState) -> Self {
        Entry {
            package,
            name,
            state,
        }
    }

    /// Table name without the extension
    pub fn name(&self) -> &str {
        self.name.display_name()
    }

    /// Member filename, extension included
    pub fn filename(&self) -> &str {
        self.name.filename()
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    /// The table's catalog row, if any
    pub fn table_record(&self) -> Option<TableRecord> {
        self.package.catalog().table(self.name.key()).cloned()
    }

    /// Byte length of the CSV stream, if known
    pub fn length(&self) -> Option<u64> {
        self.package
            .catalog()
            .table(self.name.key())
            .and_then(|t| t.byte_length)
    }

    /// Number of records, if known
    pub fn row_count(&self) -> Option<u64> {
        self.package
            .catalog()
            .table(self.name.key())
            .and_then(|t| t.row_count)
    }

    /// Number of columns, if known
    pub fn column_count(&self) -> Option<usize> {
        self.package
            .catalog()
            .table(self.name.key())
            .and_then(|t| t.column_count)
    }

    /// Column rows ordered by ordinal, or `None` when the catalog has none
    pub fn column_schema(&self) -> Option<Vec<ColumnRecord>> {
        let catalog = self.package.catalog();
        let columns = catalog.columns_for(self.name.key());
        if columns.is_empty() {
            None
        } else {
            Some(columns.into_iter().cloned().collect())
        }
    }

    /// Write the table's data and its catalog rows
    ///
    /// Fails with `TableExists` if a member with this name is already present;
    /// delete it first to replace it. The byte length and row count recorded in
    /// the catalog are measured from what was actually written. The data
    /// member and both catalog members are committed in one archive rebuild.
    ///
    /// Returns the number of records written.
    pub fn write_data(&mut self, source: &mut dyn RecordSource) -> Result<u64> {
        self.commit_data(source, false)
    }

    /// Write the table's data, replacing any existing member of this name
    ///
    /// The old member is dropped in the same rebuild that writes the new one,
    /// so a failure part way leaves the previous table in place.
    pub(crate) fn replace_data(&mut self, source: &mut dyn RecordSource) -> Result<u64> {
        self.commit_data(source, true)
    }

    fn commit_data(&mut self, source: &mut dyn RecordSource, replace: bool) -> Result<u64> {
        let existing = self.package.archive().find_table(&self.name);
        if existing.is_some() && !replace {
            return Err(CsvzError::TableExists(self.name.filename().to_string()));
        }
        let replaced = existing.map(|t| t.filename().to_string());

        let filename = self.name.filename().to_string();
        let columns: Vec<ColumnSchema> = source.columns().to_vec();
        let column_records: Vec<ColumnRecord> = columns
            .iter()
            .map(|c| ColumnRecord::from_schema(filename.as_str(), c))
            .collect();

        let mut catalog = self.package.catalog().clone();
        let (rows, bytes) = self.package.archive_mut().rebuild(
            |member| !is_catalog_member(member) && replaced.as_deref() != Some(member),
            |members| {
                let (rows, bytes) = members.write_member(&filename, MemberKind::Data, |w| {
                    let mut writer = CsvRecordWriter::new(CountingWriter::new(w));
                    let rows = writer.write_source(source)?;
                    let counter = writer.into_inner()?;
                    Ok((rows, counter.bytes_written()))
                })?;

                catalog.put_table(
                    TableRecord::measured(filename.as_str(), bytes, rows, columns.len()),
                    column_records,
                );
                catalog.write_members(members)?;
                Ok((rows, bytes))
            },
        )?;

        self.package.replace_catalog(catalog);
        self.state = EntryState::Materialized;
        match replaced {
            Some(old) => debug!("Replaced {} with {}: {} rows, {} bytes", old, filename, rows, bytes),
            None => debug!("Wrote {}: {} rows, {} bytes", filename, rows, bytes),
        }
        Ok(rows)
    }

    /// Open the table's data as typed records
    ///
    /// Column types come from the catalog when it has rows for this table;
    /// otherwise every column reads as `string`.
    pub fn data_reader(&self) -> Result<CsvRecordReader<Cursor<Vec<u8>>>> {
        let member = self
            .package
            .archive()
            .find_table(&self.name)
            .ok_or_else(|| CsvzError::TableNotFound(self.name.filename().to_string()))?;

        let hint: Option<Vec<ColumnSchema>> = self
            .column_schema()
            .map(|cols| cols.iter().map(ColumnRecord::to_schema).collect());

        let bytes = self
            .package
            .archive_mut()
            .read_member(member.filename())?
            .ok_or_else(|| CsvzError::TableNotFound(member.filename().to_string()))?;

        CsvRecordReader::with_schema(Cursor::new(bytes), hint.as_deref())
    }

    /// Delete the table's data and catalog rows
    ///
    /// With no data member present this is a no-op that resets the handle to
    /// `Unmaterialized`.
    pub fn delete(&mut self) -> Result<()> {
        let Some(member) = self.package.archive().find_table(&self.name) else {
            self.state = EntryState::Unmaterialized;
            return Ok(());
        };

        let mut catalog = self.package.catalog().clone();
        catalog.remove_table(member.key());

        let target = member.filename().to_string();
        self.package.archive_mut().rebuild(
            |name| name != target && !is_catalog_member(name),
            |members| catalog.write_members(members),
        )?;

        self.package.replace_catalog(catalog);
        self.state = EntryState::Deleted;
        debug!("Deleted {}", target);
        Ok(())
    }

    /// Replace the informational fields of the table's catalog row
    ///
    /// The measured fields (bytes, rows, columns) are kept. A table with no
    /// catalog row gets one with only these fields known.
    pub fn set_table_info(&mut self, info: TableInfo) -> Result<()> {
        self.require_member()?;

        let mut record = self
            .table_record()
            .unwrap_or_else(|| TableRecord::unknown(self.name.filename()));
        record.description = info.description;
        record.published = info.published;
        record.source = info.source;

        let mut catalog = self.package.catalog().clone();
        catalog.replace_table_record(record);
        self.commit_catalog(catalog)
    }

    /// Replace the informational fields of one column's catalog row
    pub fn set_column_info(&mut self, ordinal: usize, info: ColumnInfo) -> Result<()> {
        self.require_member()?;

        let mut record = self
            .package
            .catalog()
            .column(self.name.key(), ordinal)
            .cloned()
            .ok_or_else(|| CsvzError::ColumnNotFound {
                table: self.name.filename().to_string(),
                ordinal,
            })?;
        record.description = info.description;
        record.units = info.units;
        record.published = info.published;
        record.source = info.source;

        let mut catalog = self.package.catalog().clone();
        catalog.replace_column(record);
        self.commit_catalog(catalog)
    }

    fn require_member(&self) -> Result<()> {
        match self.package.archive().find_table(&self.name) {
            Some(_) => Ok(()),
            None => Err(CsvzError::EntryNotMaterialized(
                self.name.filename().to_string(),
            )),
        }
    }

    fn commit_catalog(&self, catalog: Catalog) -> Result<()> {
        self.package.archive_mut().rebuild(
            |name| !is_catalog_member(name),
            |members| catalog.write_members(members),
        )?;
        self.package.replace_catalog(catalog);
        Ok(())
    }
}

impl std::fmt::Debug for Entry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("filename", &self.name.filename())
            .field("state", &self.state)
            .finish()
    }
}
