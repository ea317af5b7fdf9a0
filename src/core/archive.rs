//! Zip archive adapter
//!
//! The archive is a plain zip file of named members. Reads go through a
//! `ZipArchive` snapshot of the file on disk. Mutations never edit the file in
//! place: [`Archive::rebuild`] raw-copies the members being kept into a
//! temporary file next to the target, appends new members, and renames the
//! result over the original. A failed rebuild leaves the previous archive
//! untouched.

use crate::error::Result;
use crate::naming::TableName;
use crate::options::PackageOptions;
use chrono::{Datelike, Local, Timelike};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const MAX_SIZE_HINT: u64 = 1 << 20;

/// How a new member is timestamped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Table data; stamped with the current time unless the package is reproducible
    Data,
    /// Catalog member; always stamped with the fixed zip epoch
    Catalog,
}

/// An open archive file
pub struct Archive {
    path: PathBuf,
    reader: ZipArchive<File>,
    options: PackageOptions,
}

impl Archive {
    /// Create an empty archive, truncating any existing file
    pub fn create<P: AsRef<Path>>(path: P, options: PackageOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        ZipWriter::new(file).finish()?;
        debug!("Created empty archive at {:?}", path);

        let reader = Self::load_reader(&path)?;
        Ok(Archive {
            path,
            reader,
            options,
        })
    }

    /// Open an existing archive, creating it if the path does not exist
    pub fn open<P: AsRef<Path>>(path: P, options: PackageOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("{:?} does not exist, creating", path);
            return Self::create(path, options);
        }

        let reader = Self::load_reader(path)?;
        Ok(Archive {
            path: path.to_path_buf(),
            reader,
            options,
        })
    }

    fn load_reader(path: &Path) -> Result<ZipArchive<File>> {
        let file = File::open(path)?;
        Ok(ZipArchive::new(file)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of every member, in archive order
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.reader.file_names()
    }

    /// Table members: top-level members carrying the table extension
    pub fn table_members(&self) -> Vec<TableName> {
        self.member_names()
            .filter_map(TableName::from_member)
            .collect()
    }

    /// Actual member name for a table, matched case-insensitively
    pub fn find_table(&self, name: &TableName) -> Option<TableName> {
        self.member_names()
            .filter_map(TableName::from_member)
            .find(|member| member == name)
    }

    /// Actual name of a member, matched case-insensitively
    pub fn find_member(&self, name: &str) -> Option<String> {
        self.member_names()
            .find(|member| member.eq_ignore_ascii_case(name))
            .map(str::to_string)
    }

    /// Read a whole member; `None` if it does not exist
    ///
    /// The member stream is opened and released within this call. The size
    /// declared in the zip directory is only a capacity hint and is capped.
    pub fn read_member(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.reader.by_name(name) {
            Ok(mut file) => {
                let hint = file.size().min(MAX_SIZE_HINT) as usize;
                let mut buf = Vec::with_capacity(hint);
                file.read_to_end(&mut buf)?;
                Ok(Some(buf))
            }
            Err(ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite the archive atomically
    ///
    /// Members for which `keep` returns true are copied without recompression;
    /// `add` then writes new members. The rebuilt file replaces the original
    /// only after `add` and the zip directory have been written successfully.
    pub fn rebuild<K, F, T>(&mut self, keep: K, add: F) -> Result<T>
    where
        K: Fn(&str) -> bool,
        F: FnOnce(&mut MemberWriter) -> Result<T>,
    {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = NamedTempFile::new_in(&dir)?;
        let mut zip = ZipWriter::new(tmp);

        let mut copied = 0usize;
        for i in 0..self.reader.len() {
            let file = self.reader.by_index_raw(i)?;
            if keep(file.name()) {
                zip.raw_copy_file(file)?;
                copied += 1;
            }
        }

        let mut members = MemberWriter {
            zip,
            options: &self.options,
            written: 0,
        };
        let out = add(&mut members)?;
        let written = members.written;
        let tmp = members.zip.finish()?;

        tmp.persist(&self.path).map_err(|e| e.error)?;
        self.reader = Self::load_reader(&self.path)?;

        debug!(
            "Rebuilt {:?}: {} members copied, {} written",
            self.path, copied, written
        );
        Ok(out)
    }
}

/// Writes new members during a [`Archive::rebuild`]
pub struct MemberWriter<'a> {
    zip: ZipWriter<NamedTempFile>,
    options: &'a PackageOptions,
    written: usize,
}

impl MemberWriter<'_> {
    /// Start a member and hand its stream to `body`
    pub fn write_member<T, F>(&mut self, name: &str, kind: MemberKind, body: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Write) -> Result<T>,
    {
        let stamp = match kind {
            MemberKind::Data if !self.options.reproducible => now_stamp(),
            _ => zip::DateTime::default(),
        };
        let opts = SimpleFileOptions::default()
            .compression_method(self.options.compression.method())
            .last_modified_time(stamp);

        self.zip.start_file(name, opts)?;
        let out = body(&mut self.zip)?;
        self.zip.flush()?;
        self.written += 1;
        Ok(out)
    }
}

fn now_stamp() -> zip::DateTime {
    let now = Local::now();
    zip::DateTime::from_date_and_time(
        now.year().clamp(1980, 2107) as u16,
        now.month() as u8,
        now.day() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second() as u8,
    )
    .unwrap_or_default()
}
