//! # csvz - Self-Describing Multi-Table CSV Archives
//!
//! A package is a zip archive holding any number of CSV tables plus a small
//! metadata catalog describing them:
//!
//! - `<table>.csv` members at the top level, one per table
//! - `_meta/tables.csv`: byte size, row and column counts per table
//! - `_meta/columns.csv`: declared type, nullability, size and key flags per column
//!
//! The catalog is kept consistent with the data members on every mutation and
//! is used to read tables back with typed columns. A damaged or missing catalog
//! never blocks access to the raw tables; their metadata simply reads as unknown.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use csvz::{codec::CsvRecordReader, Package, Result};
//!
//! # fn main() -> Result<()> {
//! let package = Package::create("data.csvz")?;
//!
//! let mut entry = package.create_entry("states")?;
//! let mut source = CsvRecordReader::new("Code,Name\r\nOR,Oregon\r\nWA,Washington\r\n".as_bytes())?;
//! entry.write_data(&mut source)?;
//!
//! for entry in package.entries() {
//!     println!("{}: {:?} rows", entry.name(), entry.row_count());
//! }
//!
//! let mut reader = package.get_entry("STATES")?.data_reader()?;
//! while reader.read()? {
//!     println!("{:?}", reader.get_str(1));
//! }
//!
//! package.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use csvz::{Compression, PackageBuilder};
//!
//! # fn main() -> csvz::Result<()> {
//! let package = PackageBuilder::new()
//!     .path("data.csvz")
//!     .compression(Compression::Stored)
//!     .reproducible(false)
//!     .open()?;
//! # Ok(())
//! # }
//! ```

pub mod core;
mod entry;

pub use crate::core::{catalog, codec};
pub(crate) use crate::core::{archive, error, naming, options};

pub use crate::core::{
    catalog::{
        CatalogKind, CatalogObserver, CatalogStatus, ColumnRecord, Conformance, LoadStatus,
        TableRecord, TracingObserver,
    },
    error::{CsvzError, Result},
    naming::{normalize_name, TableName, TABLE_EXTENSION},
    options::{Compression, PackageOptions},
};
pub use entry::{ColumnInfo, Entry, EntryState, TableInfo};

use crate::core::archive::Archive;
use crate::core::catalog::Catalog;
use crate::core::codec::CsvRecordReader;
use crate::core::naming::has_table_extension;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An open package file
///
/// Owns the archive and the in-memory catalog until [`Package::close`].
/// [`Entry`] handles borrow the package and cannot outlive it.
///
/// A package is a single-writer, single-threaded handle: it is not `Sync`, and
/// two packages must not mutate the same file at once.
pub struct Package {
    archive: RefCell<Archive>,
    catalog: RefCell<Catalog>,
    status: CatalogStatus,
    rewritten: Cell<bool>,
}

impl Package {
    /// Create a new, empty package, truncating any existing file
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use csvz::Package;
    ///
    /// let package = Package::create("empty.csvz")?;
    /// assert_eq!(package.entries().count(), 0);
    /// # Ok::<(), csvz::CsvzError>(())
    /// ```
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        PackageBuilder::new().path(path.as_ref()).create()
    }

    /// Open a package, creating it if the file does not exist
    ///
    /// An unreadable catalog member does not fail the open; see
    /// [`Package::catalog_status`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        PackageBuilder::new().path(path.as_ref()).open()
    }

    fn from_archive(archive: Archive, catalog: Catalog, status: CatalogStatus) -> Self {
        Package {
            archive: RefCell::new(archive),
            catalog: RefCell::new(catalog),
            status,
            rewritten: Cell::new(false),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.archive().path().to_path_buf()
    }

    /// A handle for a table that has not been written yet
    ///
    /// Nothing touches the archive until [`Entry::write_data`].
    pub fn create_entry(&self, name: &str) -> Result<Entry<'_>> {
        let name = TableName::new(name)?;
        Ok(Entry::new(self, name, EntryState::Unmaterialized))
    }

    /// Look up a table by name, case-insensitively and with or without extension
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` if no such table exists.
    pub fn get_entry(&self, name: &str) -> Result<Entry<'_>> {
        self.find_entry(name)?
            .ok_or_else(|| CsvzError::TableNotFound(normalize_name(name.trim())))
    }

    /// Like [`Package::get_entry`], but `Ok(None)` when the table is absent
    pub fn find_entry(&self, name: &str) -> Result<Option<Entry<'_>>> {
        let wanted = TableName::new(name)?;
        let found = self.archive().find_table(&wanted);
        Ok(found.map(|member| Entry::new(self, member, EntryState::Materialized)))
    }

    /// Whether a table with this name exists
    pub fn contains(&self, name: &str) -> bool {
        matches!(self.find_entry(name), Ok(Some(_)))
    }

    /// Every table in the archive
    ///
    /// Handles are created as the iterator advances; call again to restart.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            package: self,
            names: self.archive().table_members().into_iter(),
        }
    }

    /// Table names without extension, in archive order
    pub fn table_names(&self) -> Vec<String> {
        self.archive()
            .table_members()
            .iter()
            .map(|t| t.display_name().to_string())
            .collect()
    }

    /// How each catalog member fared when the package was opened
    pub fn catalog_status(&self) -> &CatalogStatus {
        &self.status
    }

    /// Conformance as published by the format: always the basic tier
    pub fn declared_conformance(&self) -> Conformance {
        Conformance::BASIC
    }

    /// Tiers the archive carries now
    ///
    /// Starts from what the catalog load found; once this package has
    /// rewritten the catalog, both catalog members are present and counted.
    /// [`Package::catalog_status`] still reports the load itself.
    pub fn detected_conformance(&self) -> Conformance {
        let mut conformance = Conformance::detect(&self.status);
        if self.rewritten.get() {
            conformance.meta_tables = true;
            conformance.meta_columns = true;
        }
        conformance
    }

    /// Add a CSV file as a table, reading every column as `string`
    ///
    /// The table name defaults to the file name. With `overwrite`, an existing
    /// table of the same name is replaced; otherwise it is an error. The file
    /// is opened and its header read before the archive is touched, and the
    /// replacement is a single rebuild, so a failure leaves the old table.
    pub fn add_csv_file<P: AsRef<Path>>(
        &self,
        path: P,
        name: Option<&str>,
        overwrite: bool,
    ) -> Result<Entry<'_>> {
        let path = path.as_ref();
        let name = match name {
            Some(n) => n.to_string(),
            None => path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    CsvzError::InvalidTableName(format!("{:?} has no file name", path))
                })?
                .to_string(),
        };

        let mut entry = self.create_entry(&name)?;
        let file = File::open(path)?;
        let mut source = CsvRecordReader::new(BufReader::new(file))?;

        let rows = if overwrite {
            entry.replace_data(&mut source)?
        } else {
            entry.write_data(&mut source)?
        };
        info!("Added {:?} as {} ({} rows)", path, entry.filename(), rows);
        Ok(entry)
    }

    /// Add every top-level `*.csv` file of a directory, in file name order
    ///
    /// Returns the names of the tables added.
    pub fn pack_directory<P: AsRef<Path>>(&self, dir: P, overwrite: bool) -> Result<Vec<String>> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(has_table_extension)
            })
            .collect();
        files.sort();

        let mut names = Vec::with_capacity(files.len());
        for file in &files {
            let entry = self.add_csv_file(file, None, overwrite)?;
            names.push(entry.name().to_string());
        }
        info!("Packed {} tables from {:?}", names.len(), dir);
        Ok(names)
    }

    /// Release the archive
    ///
    /// Every mutation is already persisted when it returns, so closing only
    /// drops the open file handle.
    pub fn close(self) -> Result<()> {
        let archive = self.archive.into_inner();
        info!("Closing package at {:?}", archive.path());
        drop(archive);
        Ok(())
    }

    pub(crate) fn archive(&self) -> Ref<'_, Archive> {
        self.archive.borrow()
    }

    pub(crate) fn archive_mut(&self) -> RefMut<'_, Archive> {
        self.archive.borrow_mut()
    }

    pub(crate) fn catalog(&self) -> Ref<'_, Catalog> {
        self.catalog.borrow()
    }

    /// Install the catalog that was just written to the archive
    pub(crate) fn replace_catalog(&self, catalog: Catalog) {
        *self.catalog.borrow_mut() = catalog;
        self.rewritten.set(true);
    }
}

/// Iterator over the tables of a [`Package`]
#[derive(Clone)]
pub struct Entries<'p> {
    package: &'p Package,
    names: std::vec::IntoIter<TableName>,
}

impl<'p> Iterator for Entries<'p> {
    type Item = Entry<'p>;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.names.next()?;
        Some(Entry::new(self.package, name, EntryState::Materialized))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.names.size_hint()
    }
}

/// Builder for opening or creating a package with custom options
///
/// # Examples
///
/// ```rust,no_run
/// use csvz::{PackageBuilder, PackageOptions};
///
/// # fn main() -> csvz::Result<()> {
/// let options = PackageOptions::from_toml_str("compression = \"stored\"")?;
/// let package = PackageBuilder::new()
///     .path("data.csvz")
///     .options(options)
///     .create()?;
/// # Ok(())
/// # }
/// ```
pub struct PackageBuilder {
    path: Option<PathBuf>,
    options: PackageOptions,
    observer: Option<Box<dyn CatalogObserver>>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        PackageBuilder {
            path: None,
            options: PackageOptions::default(),
            observer: None,
        }
    }

    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Replace all options at once
    pub fn options(mut self, options: PackageOptions) -> Self {
        self.options = options;
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.options.compression = compression;
        self
    }

    pub fn reproducible(mut self, reproducible: bool) -> Self {
        self.options.reproducible = reproducible;
        self
    }

    /// Receive catalog load outcomes (defaults to [`TracingObserver`])
    pub fn observer<O: CatalogObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    fn take_path(&mut self) -> Result<PathBuf> {
        self.path.take().ok_or_else(|| {
            CsvzError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path must be set",
            ))
        })
    }

    /// Create a new, empty package
    pub fn create(mut self) -> Result<Package> {
        let path = self.take_path()?;
        info!("Creating package at {:?}", path);
        let archive = Archive::create(&path, self.options)?;
        Ok(Package::from_archive(
            archive,
            Catalog::new(),
            CatalogStatus::absent(),
        ))
    }

    /// Open a package, creating it if missing, and load its catalog
    pub fn open(mut self) -> Result<Package> {
        let path = self.take_path()?;
        info!("Opening package at {:?}", path);
        let mut archive = Archive::open(&path, self.options)?;

        let observer: &dyn CatalogObserver = match &self.observer {
            Some(o) => o.as_ref(),
            None => &TracingObserver,
        };
        let (mut catalog, status) = Catalog::load(&mut archive, observer);

        let present: HashSet<String> = archive
            .table_members()
            .iter()
            .map(|t| t.key().to_string())
            .collect();
        catalog.retain_tables(&present);
        debug!(
            "Package has {} tables, {} with catalog rows",
            present.len(),
            catalog.table_count()
        );

        Ok(Package::from_archive(archive, catalog, status))
    }
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
