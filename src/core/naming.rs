//! Table name normalization
//!
//! Tables live at the top level of the archive as `<name>.csv` members. Callers
//! may refer to a table with or without the extension and in any case:
//! "states", "STATES" and "states.CSV" all denote the same table.

use crate::error::{CsvzError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Canonical extension carried by every table member
pub const TABLE_EXTENSION: &str = ".csv";

/// Reserved directory holding the catalog members
pub const META_DIR: &str = "_meta/";

/// Append the canonical extension if absent
///
/// Case is preserved. The function is idempotent.
///
/// # Examples
///
/// ```
/// use csvz::normalize_name;
///
/// assert_eq!(normalize_name("states"), "states.csv");
/// assert_eq!(normalize_name("STATES.CSV"), "STATES.CSV");
/// assert_eq!(normalize_name(&normalize_name("x")), normalize_name("x"));
/// ```
pub fn normalize_name(name: &str) -> String {
    if has_table_extension(name) {
        name.to_string()
    } else {
        format!("{}{}", name, TABLE_EXTENSION)
    }
}

/// Case-insensitive check for the canonical extension
pub fn has_table_extension(name: &str) -> bool {
    name.len() >= TABLE_EXTENSION.len()
        && name
            .get(name.len() - TABLE_EXTENSION.len()..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(TABLE_EXTENSION))
}

/// Case-fold a name for key comparison
pub(crate) fn fold(name: &str) -> String {
    name.to_lowercase()
}

/// A normalized table name
///
/// Equality, ordering and hashing use the case-folded filename, so two names
/// that differ only in case compare equal.
#[derive(Debug, Clone)]
pub struct TableName {
    filename: String,
    key: String,
}

impl TableName {
    /// Normalize and validate a caller-supplied table name
    ///
    /// # Errors
    ///
    /// Returns `InvalidTableName` for empty names and names containing path
    /// separators (tables only live at the archive's top level).
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref().trim();

        if name.is_empty() {
            return Err(CsvzError::InvalidTableName(
                "table name cannot be empty".to_string(),
            ));
        }

        if name.contains('/') || name.contains('\\') {
            return Err(CsvzError::InvalidTableName(format!(
                "'{}' contains a path separator",
                name
            )));
        }

        let filename = normalize_name(name);
        if filename.len() == TABLE_EXTENSION.len() {
            return Err(CsvzError::InvalidTableName(format!(
                "'{}' has no name before the extension",
                name
            )));
        }

        Ok(Self::from_filename(filename))
    }

    /// Build a name from an archive member path, if that member is a table
    ///
    /// Only top-level members carrying the table extension qualify; anything
    /// under a directory (notably `_meta/`) is rejected.
    pub fn from_member(path: &str) -> Option<Self> {
        if path.contains('/') || path.contains('\\') || !has_table_extension(path) {
            return None;
        }
        if path.len() == TABLE_EXTENSION.len() {
            return None;
        }
        Some(Self::from_filename(path.to_string()))
    }

    fn from_filename(filename: String) -> Self {
        let key = fold(&filename);
        TableName { filename, key }
    }

    /// Filename including the extension, case preserved
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Case-folded filename used as the catalog key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Filename without the extension
    pub fn display_name(&self) -> &str {
        &self.filename[..self.filename.len() - TABLE_EXTENSION.len()]
    }
}

impl PartialEq for TableName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TableName {}

impl Hash for TableName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for TableName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TableName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filename)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.filename
    }
}
