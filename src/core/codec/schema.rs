//! Column schema and typed field values

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Boolean,
    Int32,
    Int64,
    Double,
    Date,
    DateTime,
}

impl DataType {
    /// Tag written to the `type` column of the column catalog
    pub fn tag(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Boolean => "boolean",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Double => "double",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
        }
    }

    /// Parse a type tag, case-insensitively
    ///
    /// A few common aliases are accepted so hand-written catalogs work.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let t = match tag.trim().to_ascii_lowercase().as_str() {
            "string" | "text" | "varchar" => DataType::String,
            "boolean" | "bool" => DataType::Boolean,
            "int32" | "int" | "integer" => DataType::Int32,
            "int64" | "long" | "bigint" => DataType::Int64,
            "double" | "float" | "float64" | "real" => DataType::Double,
            "date" => DataType::Date,
            "datetime" | "timestamp" => DataType::DateTime,
            _ => return None,
        };
        Some(t)
    }

    fn expected(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Boolean => "a boolean",
            DataType::Int32 => "a 32-bit integer",
            DataType::Int64 => "a 64-bit integer",
            DataType::Double => "a number",
            DataType::Date => "a date",
            DataType::DateTime => "a date/time",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Declared shape of one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name from the header row
    pub name: String,

    /// 0-based position
    pub ordinal: usize,

    /// Declared type
    pub data_type: DataType,

    /// Whether empty fields are allowed
    pub nullable: bool,

    /// Maximum field length, if declared
    pub max_length: Option<u32>,

    /// Whether values are unique within the table
    pub unique: bool,

    /// Whether the column is part of the primary key
    pub primary_key: bool,
}

impl ColumnSchema {
    /// A nullable column with no key attributes
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        ColumnSchema {
            name: name.into(),
            ordinal: 0,
            data_type,
            nullable: true,
            max_length: None,
            unique: false,
            primary_key: false,
        }
    }

    pub fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark as primary key (implies unique and not null)
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.unique = true;
        self.nullable = false;
        self
    }
}

/// One typed field
///
/// An empty CSV field is always `Null`, whatever the declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Parse field text as the given type
    ///
    /// On failure, returns a description of the expected type.
    pub fn parse(text: &str, data_type: DataType) -> std::result::Result<Value, &'static str> {
        if text.is_empty() {
            return Ok(Value::Null);
        }

        let value = match data_type {
            DataType::String => Some(Value::String(text.to_string())),
            DataType::Boolean => parse_bool(text).map(Value::Boolean),
            DataType::Int32 => text.trim().parse().ok().map(Value::Int32),
            DataType::Int64 => text.trim().parse().ok().map(Value::Int64),
            DataType::Double => text.trim().parse().ok().map(Value::Double),
            DataType::Date => parse_date(text).map(Value::Date),
            DataType::DateTime => parse_datetime(text).map(Value::DateTime),
        };

        value.ok_or(data_type.expected())
    }

    /// Text written to the CSV stream; `Null` becomes an empty field
    pub fn to_field(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::String(s) => Cow::Borrowed(s),
            Value::Boolean(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Value::Int32(v) => Cow::Owned(v.to_string()),
            Value::Int64(v) => Cow::Owned(v.to_string()),
            Value::Double(v) => Cow::Owned(v.to_string()),
            Value::Date(d) => Cow::Owned(format_date(*d)),
            Value::DateTime(dt) => Cow::Owned(format_datetime(*dt)),
        }
    }

    /// The type this value carries, `None` for `Null`
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::String(_) => Some(DataType::String),
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int32(_) => Some(DataType::Int32),
            Value::Int64(_) => Some(DataType::Int64),
            Value::Double(_) => Some(DataType::Double),
            Value::Date(_) => Some(DataType::Date),
            Value::DateTime(_) => Some(DataType::DateTime),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    let t = text.trim();
    if t.eq_ignore_ascii_case("true") || t == "1" {
        Some(true)
    } else if t.eq_ignore_ascii_case("false") || t == "0" {
        Some(false)
    } else {
        None
    }
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let t = text.trim();
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(t).map(|dt| dt.date()))
}

/// Accepts RFC 3339, ISO 8601 without offset (`T` or space separated) and
/// bare dates (midnight)
pub(crate) fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let t = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub(crate) fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub(crate) fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}
