//! Column-level catalog rows (`_meta/columns.csv`)

use super::{
    field_bool, field_datetime, field_parsed, field_text, optional, required_column,
    required_text,
};
use crate::codec::{format_datetime, ColumnSchema, CsvRecordReader, DataType, Value};
use crate::error::{CsvzError, Result};
use chrono::NaiveDateTime;
use serde::Serialize;

pub(crate) const HEADER: [&str; 12] = [
    "filename",
    "column",
    "ordinal",
    "type",
    "nullable",
    "max-length",
    "unique",
    "primary-key",
    "description",
    "units",
    "published",
    "source",
];

/// One row per column per table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRecord {
    /// Owning table's member filename
    pub filename: String,
    pub column_name: String,

    /// 0-based position in the table
    pub ordinal: usize,

    /// Type tag as stored; unknown tags are kept verbatim
    pub type_tag: Option<String>,
    pub nullable: Option<bool>,
    pub max_length: Option<u32>,
    pub unique: Option<bool>,
    pub primary_key: Option<bool>,
    pub description: Option<String>,
    pub units: Option<String>,
    pub published: Option<NaiveDateTime>,
    pub source: Option<String>,
}

impl ColumnRecord {
    /// Capture a declared column schema for a table
    pub fn from_schema(filename: impl Into<String>, schema: &ColumnSchema) -> Self {
        ColumnRecord {
            filename: filename.into(),
            column_name: schema.name.clone(),
            ordinal: schema.ordinal,
            type_tag: Some(schema.data_type.tag().to_string()),
            nullable: Some(schema.nullable),
            max_length: schema.max_length,
            unique: Some(schema.unique),
            primary_key: Some(schema.primary_key),
            description: None,
            units: None,
            published: None,
            source: None,
        }
    }

    /// Declared type; absent or unrecognized tags read as `string`
    pub fn data_type(&self) -> DataType {
        self.type_tag
            .as_deref()
            .and_then(DataType::from_tag)
            .unwrap_or_default()
    }

    /// Read-time schema for this column
    ///
    /// Absent attributes take the codec defaults: nullable, not unique, not a key.
    pub fn to_schema(&self) -> ColumnSchema {
        ColumnSchema {
            name: self.column_name.clone(),
            ordinal: self.ordinal,
            data_type: self.data_type(),
            nullable: self.nullable.unwrap_or(true),
            max_length: self.max_length,
            unique: self.unique.unwrap_or(false),
            primary_key: self.primary_key.unwrap_or(false),
        }
    }

    pub(crate) fn values(&self) -> Vec<Value> {
        vec![
            Value::String(self.filename.clone()),
            Value::String(self.column_name.clone()),
            Value::String(self.ordinal.to_string()),
            optional(self.type_tag.as_ref()),
            optional(self.nullable),
            optional(self.max_length),
            optional(self.unique),
            optional(self.primary_key),
            optional(self.description.as_ref()),
            optional(self.units.as_ref()),
            optional(self.published.map(format_datetime)),
            optional(self.source.as_ref()),
        ]
    }
}

/// Parse a columns catalog stream
///
/// `filename`, `column` and `ordinal` are required; other recognized columns
/// that are missing read as absent for every row.
pub(crate) fn parse(bytes: &[u8]) -> Result<Vec<ColumnRecord>> {
    let mut reader = CsvRecordReader::new(bytes)?;

    let filename = required_column(&reader, "filename")?;
    let column = required_column(&reader, "column")?;
    let ordinal = required_column(&reader, "ordinal")?;
    let type_tag = reader.get_ordinal("type");
    let nullable = reader.get_ordinal("nullable");
    let max_length = reader.get_ordinal("max-length");
    let unique = reader.get_ordinal("unique");
    let primary_key = reader.get_ordinal("primary-key");
    let description = reader.get_ordinal("description");
    let units = reader.get_ordinal("units");
    let published = reader.get_ordinal("published");
    let source = reader.get_ordinal("source");

    let mut out = Vec::new();
    while reader.read()? {
        let position = field_parsed(&reader, Some(ordinal), "ordinal", "an ordinal")?
            .ok_or_else(|| {
                CsvzError::MalformedCatalog(format!(
                    "row {} has no ordinal",
                    reader.row_number()
                ))
            })?;

        out.push(ColumnRecord {
            filename: required_text(&reader, filename, "filename")?,
            column_name: required_text(&reader, column, "column")?,
            ordinal: position,
            type_tag: field_text(&reader, type_tag),
            nullable: field_bool(&reader, nullable, "nullable")?,
            max_length: field_parsed(&reader, max_length, "max-length", "a length")?,
            unique: field_bool(&reader, unique, "unique")?,
            primary_key: field_bool(&reader, primary_key, "primary-key")?,
            description: field_text(&reader, description),
            units: field_text(&reader, units),
            published: field_datetime(&reader, published, "published")?,
            source: field_text(&reader, source),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_LINE: &str =
        "filename,column,ordinal,type,nullable,max-length,unique,primary-key,description,units,published,source\r\n";

    #[test]
    fn test_parse_rows() {
        let data = format!(
            "{}states.csv,Code,0,string,false,2,true,true,,,,\r\nstates.csv,Name,1,string,true,,false,false,State name,,,\r\n",
            HEADER_LINE
        );
        let rows = parse(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].column_name, "Code");
        assert_eq!(rows[0].max_length, Some(2));
        assert_eq!(rows[0].primary_key, Some(true));
        assert_eq!(rows[1].ordinal, 1);
        assert_eq!(rows[1].max_length, None);
        assert_eq!(rows[1].description.as_deref(), Some("State name"));
    }

    #[test]
    fn test_schema_round_trip() {
        let schema = ColumnSchema::new("id", DataType::Int64)
            .with_ordinal(3)
            .with_max_length(12)
            .primary_key();
        let record = ColumnRecord::from_schema("t.csv", &schema);
        assert_eq!(record.type_tag.as_deref(), Some("int64"));
        assert_eq!(record.to_schema(), schema);
    }

    #[test]
    fn test_absent_attributes_use_defaults() {
        let data = "filename,column,ordinal\r\nt.csv,x,0\r\n";
        let rows = parse(data.as_bytes()).unwrap();
        let schema = rows[0].to_schema();
        assert_eq!(rows[0].nullable, None);
        assert!(schema.nullable);
        assert!(!schema.unique);
        assert_eq!(schema.data_type, DataType::String);
    }

    #[test]
    fn test_unknown_type_tag_is_preserved() {
        let data = "filename,column,ordinal,type\r\nt.csv,x,0,geometry\r\n";
        let rows = parse(data.as_bytes()).unwrap();
        assert_eq!(rows[0].type_tag.as_deref(), Some("geometry"));
        assert_eq!(rows[0].data_type(), DataType::String);
    }

    #[test]
    fn test_missing_ordinal_is_malformed() {
        let data = "filename,column,ordinal\r\nt.csv,x,\r\n";
        assert!(parse(data.as_bytes()).is_err());
        let data = "filename,column\r\nt.csv,x\r\n";
        assert!(parse(data.as_bytes()).is_err());
    }
}
