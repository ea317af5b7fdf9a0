use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvzError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0} (delete it before writing new data)")]
    TableExists(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Table has no data yet: {0}")]
    EntryNotMaterialized(String),

    #[error("Column ordinal {ordinal} out of range for table {table}")]
    ColumnNotFound { table: String, ordinal: usize },

    #[error("Row {row}, column '{column}': cannot read '{value}' as {expected}")]
    FieldParse {
        row: u64,
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("Malformed catalog: {0}")]
    MalformedCatalog(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CsvzError>;

impl CsvzError {
    /// True for the "no such table" condition, which CLI flows branch on
    pub fn is_not_found(&self) -> bool {
        matches!(self, CsvzError::TableNotFound(_))
    }
}
