//! Catalog load outcomes and conformance tiers

use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Which catalog member a status refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Tables,
    Columns,
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogKind::Tables => f.write_str("tables"),
            CatalogKind::Columns => f.write_str("columns"),
        }
    }
}

/// Outcome of loading one catalog member
///
/// A catalog that fails to parse never fails the package open; it is
/// reported as `Recovered` and starts empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LoadStatus {
    /// No catalog member in the archive
    Absent,
    /// Member present but unreadable; the catalog starts empty
    Recovered { reason: String },
    /// Member parsed
    Loaded { rows: usize },
}

impl LoadStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadStatus::Loaded { .. })
    }
}

/// Load outcome of both catalog members
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStatus {
    pub tables: LoadStatus,
    pub columns: LoadStatus,
}

impl CatalogStatus {
    /// Status of a freshly created package
    pub fn absent() -> Self {
        CatalogStatus {
            tables: LoadStatus::Absent,
            columns: LoadStatus::Absent,
        }
    }
}

/// Hook notified once per catalog member when a package is opened
pub trait CatalogObserver {
    fn catalog_loaded(&self, kind: CatalogKind, status: &LoadStatus);
}

/// Default observer: reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CatalogObserver for TracingObserver {
    fn catalog_loaded(&self, kind: CatalogKind, status: &LoadStatus) {
        match status {
            LoadStatus::Absent => debug!("No {} catalog present", kind),
            LoadStatus::Recovered { reason } => {
                warn!("Ignoring unreadable {} catalog: {}", kind, reason)
            }
            LoadStatus::Loaded { rows } => debug!("Loaded {} catalog ({} rows)", kind, rows),
        }
    }
}

/// Metadata tiers an archive carries
///
/// `basic` holds for any archive of CSV members. The relations tier is
/// defined but never written or detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Conformance {
    pub basic: bool,
    pub meta_tables: bool,
    pub meta_columns: bool,
    pub meta_relations: bool,
}

impl Conformance {
    /// Only the basic tier
    pub const BASIC: Conformance = Conformance {
        basic: true,
        meta_tables: false,
        meta_columns: false,
        meta_relations: false,
    };

    /// Tiers present according to a catalog load
    pub fn detect(status: &CatalogStatus) -> Self {
        Conformance {
            meta_tables: status.tables.is_loaded(),
            meta_columns: status.columns.is_loaded(),
            ..Self::BASIC
        }
    }

    /// Pack into bit flags (basic = 1, tables = 2, columns = 4, relations = 8)
    pub fn to_bits(self) -> u8 {
        (self.basic as u8)
            | (self.meta_tables as u8) << 1
            | (self.meta_columns as u8) << 2
            | (self.meta_relations as u8) << 3
    }

    pub fn from_bits(bits: u8) -> Self {
        Conformance {
            basic: bits & 1 != 0,
            meta_tables: bits & 2 != 0,
            meta_columns: bits & 4 != 0,
            meta_relations: bits & 8 != 0,
        }
    }
}

impl Default for Conformance {
    fn default() -> Self {
        Self::BASIC
    }
}

impl fmt::Display for Conformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tiers: Vec<&str> = [
            (self.basic, "basic"),
            (self.meta_tables, "meta-tables"),
            (self.meta_columns, "meta-columns"),
            (self.meta_relations, "meta-relations"),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| name)
        .collect();
        f.write_str(&tiers.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_only_counts_loaded() {
        let status = CatalogStatus {
            tables: LoadStatus::Loaded { rows: 2 },
            columns: LoadStatus::Recovered {
                reason: "bad".into(),
            },
        };
        let c = Conformance::detect(&status);
        assert!(c.basic);
        assert!(c.meta_tables);
        assert!(!c.meta_columns);
        assert!(!c.meta_relations);
        assert_eq!(c.to_string(), "basic,meta-tables");
    }

    #[test]
    fn test_bits() {
        assert_eq!(Conformance::BASIC.to_bits(), 1);
        let all = Conformance::from_bits(0b1111);
        assert!(all.meta_relations);
        assert_eq!(all.to_bits(), 15);
    }
}
