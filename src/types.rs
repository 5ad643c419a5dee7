//! Core type definitions for managed tables
//!
//! Includes caller identity, column specifications, the registry record,
//! and the value/row types exchanged with the database.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ManagedStoreError, Result};
use crate::sql::sanitize::{SafeIdentifier, SafeTypeLiteral, quote_identifier, validate_data_type};

/// Name of the surrogate key injected as the first column of every managed table
pub const SURROGATE_KEY_COLUMN: &str = "id";

// ============================================================================
// Caller identity
// ============================================================================

/// Identity of the caller issuing a request
///
/// Supplied by the surrounding application and trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Owner id recorded for tables this caller creates
    pub id: i64,
    /// Privileged callers bypass ownership checks
    #[serde(default)]
    pub privileged: bool,
}

impl Caller {
    /// A regular caller subject to ownership checks
    pub fn user(id: i64) -> Self {
        Self {
            id,
            privileged: false,
        }
    }

    /// A caller that bypasses ownership checks
    pub fn privileged(id: i64) -> Self {
        Self {
            id,
            privileged: true,
        }
    }
}

// ============================================================================
// Column specifications
// ============================================================================

/// A caller-supplied column for a table to be created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnSpec {
    /// Column name (must satisfy the identifier grammar)
    pub name: String,
    /// Declared type, e.g. `INT` or `VARCHAR(100)`
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// Validate the name and type of this column
    pub fn sanitize(&self) -> Result<SanitizedColumn> {
        let name = quote_identifier(&self.name)?;
        if name.as_str() == SURROGATE_KEY_COLUMN {
            return Err(ManagedStoreError::invalid_identifier(format!(
                "Column name '{}' is reserved for the surrogate key",
                SURROGATE_KEY_COLUMN
            )));
        }
        let data_type = validate_data_type(&self.data_type)?;
        Ok(SanitizedColumn { name, data_type })
    }
}

/// A column whose name and type have both been validated
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedColumn {
    pub name: SafeIdentifier,
    pub data_type: SafeTypeLiteral,
}

/// Request to create a new managed table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableRequest {
    /// Table name (must satisfy the identifier grammar)
    #[serde(rename = "tableName")]
    pub table_name: String,
    /// Caller-specified columns; the surrogate key is added automatically
    pub columns: Vec<ColumnSpec>,
}

impl CreateTableRequest {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    /// Add a column
    pub fn column(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.columns.push(ColumnSpec::new(name, data_type));
        self
    }
}

// ============================================================================
// Registry record
// ============================================================================

/// A table created through the store and tracked in the ownership registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedTable {
    /// Surrogate id assigned by the registry
    #[serde(rename = "tableId")]
    pub table_id: i64,
    /// Unquoted table name
    #[serde(rename = "tableName")]
    pub table_name: String,
    /// Id of the creating caller
    #[serde(rename = "ownerId")]
    pub owner_id: i64,
    /// When the table was registered
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ManagedTable {
    /// Build from a registry row (`id`, `table_name`, `owner_id`, `created_at`)
    pub fn from_row(row: &Row) -> Result<Self> {
        let field = |name: &str| {
            row.get(name)
                .ok_or_else(|| ManagedStoreError::decode(format!("registry row missing '{}'", name)))
        };

        let table_id = field("id")?
            .as_i64()
            .ok_or_else(|| ManagedStoreError::decode("registry id is not an integer"))?;
        let table_name = field("table_name")?
            .as_str()
            .ok_or_else(|| ManagedStoreError::decode("registry table_name is not text"))?
            .to_string();
        let owner_id = field("owner_id")?
            .as_i64()
            .ok_or_else(|| ManagedStoreError::decode("registry owner_id is not an integer"))?;
        let created_at = field("created_at")?
            .as_timestamp()
            .ok_or_else(|| ManagedStoreError::decode("registry created_at is not a timestamp"))?;

        Ok(Self {
            table_id,
            table_name,
            owner_id,
            created_at,
        })
    }
}

// ============================================================================
// Values
// ============================================================================

/// A bound parameter or a result cell
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Text(String),
    Json(serde_json::Value),
}

impl SqlValue {
    /// Infer a typed value from untyped text input
    ///
    /// Precedence is fixed: integer, then boolean (`true`/`false`, any case),
    /// then date/time, then text. `"1"` is therefore an integer, never a boolean.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Ok(v) = trimmed.parse::<i64>() {
            return SqlValue::Integer(v);
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return SqlValue::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return SqlValue::Boolean(false);
        }
        if let Some(ts) = parse_timestamp(trimmed) {
            return SqlValue::Timestamp(ts);
        }

        SqlValue::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            SqlValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }
}

/// Accepted date/time layouts, tried after RFC 3339
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a date/time string; values without an offset are taken as UTC
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Boolean(v) => write!(f, "{}", v),
            SqlValue::Timestamp(v) => f.write_str(&v.to_rfc3339()),
            SqlValue::Text(v) => f.write_str(v),
            SqlValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Integer(v) => serializer.serialize_i64(*v),
            SqlValue::Float(v) => serializer.serialize_f64(*v),
            SqlValue::Decimal(v) => serializer.serialize_str(&v.to_string()),
            SqlValue::Boolean(v) => serializer.serialize_bool(*v),
            SqlValue::Timestamp(v) => serializer.serialize_str(&v.to_rfc3339()),
            SqlValue::Text(v) => serializer.serialize_str(v),
            SqlValue::Json(v) => v.serialize(serializer),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v.into())
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Boolean(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        SqlValue::Json(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Infer typed values for a set of untyped `(column, text)` pairs
pub fn infer_row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> BTreeMap<String, SqlValue>
where
    K: Into<String>,
    V: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), SqlValue::infer(v.as_ref())))
        .collect()
}

// ============================================================================
// Rows
// ============================================================================

/// One result row, keeping the column order reported by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cell
    pub fn push(&mut self, column: impl Into<String>, value: SqlValue) {
        self.cells.push((column.into(), value));
    }

    /// Append a cell, builder style
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value.into());
        self
    }

    /// Value of the first column with this name
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(String, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // =========================================================================
    // Value inference
    // =========================================================================

    #[test]
    fn test_infer_integer_first() {
        assert_eq!(SqlValue::infer("42"), SqlValue::Integer(42));
        assert_eq!(SqlValue::infer("-7"), SqlValue::Integer(-7));
        assert_eq!(SqlValue::infer("1"), SqlValue::Integer(1));
        assert_eq!(SqlValue::infer("0"), SqlValue::Integer(0));
    }

    #[test]
    fn test_infer_boolean() {
        assert_eq!(SqlValue::infer("true"), SqlValue::Boolean(true));
        assert_eq!(SqlValue::infer("FALSE"), SqlValue::Boolean(false));
        assert_eq!(SqlValue::infer("True"), SqlValue::Boolean(true));
        // Not booleans
        assert_eq!(SqlValue::infer("yes"), SqlValue::Text("yes".to_string()));
    }

    #[test]
    fn test_infer_timestamp() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();

        assert_eq!(
            SqlValue::infer("2024-01-15T10:30:00Z"),
            SqlValue::Timestamp(expected)
        );
        assert_eq!(
            SqlValue::infer("2024-01-15T12:30:00+02:00"),
            SqlValue::Timestamp(expected)
        );
        assert_eq!(
            SqlValue::infer("2024-01-15 10:30:00"),
            SqlValue::Timestamp(expected)
        );
        assert_eq!(
            SqlValue::infer("2024-01-15 10:30"),
            SqlValue::Timestamp(expected)
        );
        assert_eq!(
            SqlValue::infer("2024-01-15"),
            SqlValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_infer_text_fallback() {
        assert_eq!(SqlValue::infer("Ada Lovelace"), SqlValue::Text("Ada Lovelace".to_string()));
        assert_eq!(SqlValue::infer("12.5"), SqlValue::Text("12.5".to_string()));
        assert_eq!(SqlValue::infer("2024-13-45"), SqlValue::Text("2024-13-45".to_string()));
        assert_eq!(SqlValue::infer(""), SqlValue::Text(String::new()));
    }

    #[test]
    fn test_infer_text_keeps_original_spacing() {
        assert_eq!(SqlValue::infer(" hello "), SqlValue::Text(" hello ".to_string()));
        assert_eq!(SqlValue::infer(" 5 "), SqlValue::Integer(5));
    }

    #[test]
    fn test_infer_row() {
        let row = infer_row([("n", "42"), ("flag", "true"), ("label", "x")]);
        assert_eq!(row["n"], SqlValue::Integer(42));
        assert_eq!(row["flag"], SqlValue::Boolean(true));
        assert_eq!(row["label"], SqlValue::Text("x".to_string()));
    }

    // =========================================================================
    // Conversions and serialization
    // =========================================================================

    #[test]
    fn test_value_conversions() {
        assert_eq!(SqlValue::from(5_i32), SqlValue::Integer(5));
        assert_eq!(SqlValue::from("abc"), SqlValue::Text("abc".to_string()));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(true)), SqlValue::Boolean(true));
    }

    #[test]
    fn test_value_serialization() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let row = Row::new()
            .with("id", 1_i64)
            .with("name", "Ada")
            .with("active", true)
            .with("seen", ts)
            .with("price", Decimal::new(1999, 2))
            .with("note", None::<String>);

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 1,
                "name": "Ada",
                "active": true,
                "seen": "2024-01-15T10:30:00+00:00",
                "price": "19.99",
                "note": null
            })
        );
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::new().with("b", 2_i64).with("a", 1_i64);
        assert_eq!(row.len(), 2);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(row.get("a"), Some(&SqlValue::Integer(1)));
        assert_eq!(row.get("missing"), None);
        assert!(Row::new().is_empty());
    }

    // =========================================================================
    // Column specs
    // =========================================================================

    #[test]
    fn test_column_spec_sanitize() {
        let col = ColumnSpec::new("full_name", "VARCHAR(100)").sanitize().unwrap();
        assert_eq!(col.name.to_string(), "\"full_name\"");
        assert_eq!(col.data_type.as_str(), "VARCHAR(100)");
    }

    #[test]
    fn test_column_spec_rejects_surrogate_key_name() {
        let err = ColumnSpec::new("id", "INT").sanitize().unwrap_err();
        assert!(matches!(err, ManagedStoreError::InvalidIdentifier(_)));
        // Quoted identifiers are case-sensitive, so "ID" does not collide
        assert!(ColumnSpec::new("ID", "INT").sanitize().is_ok());
    }

    #[test]
    fn test_column_spec_rejects_bad_type() {
        let err = ColumnSpec::new("n", "INT; DROP").sanitize().unwrap_err();
        assert!(matches!(err, ManagedStoreError::InvalidDataType(_)));
    }

    #[test]
    fn test_column_spec_deserialization() {
        let col: ColumnSpec = serde_json::from_str(r#"{"name":"n","type":"INT"}"#).unwrap();
        assert_eq!(col, ColumnSpec::new("n", "INT"));
    }

    #[test]
    fn test_create_table_request_builder() {
        let request = CreateTableRequest::new("contacts", vec![])
            .column("full_name", "VARCHAR(100)")
            .column("age", "INT");
        assert_eq!(request.table_name, "contacts");
        assert_eq!(request.columns.len(), 2);
    }

    // =========================================================================
    // ManagedTable
    // =========================================================================

    #[test]
    fn test_managed_table_from_row() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let row = Row::new()
            .with("id", 7_i64)
            .with("table_name", "contacts")
            .with("owner_id", 2_i64)
            .with("created_at", ts);

        let table = ManagedTable::from_row(&row).unwrap();
        assert_eq!(table.table_id, 7);
        assert_eq!(table.table_name, "contacts");
        assert_eq!(table.owner_id, 2);
        assert_eq!(table.created_at, ts);

        let json = serde_json::to_string(&table).unwrap();
        assert!(json.contains("\"tableName\":\"contacts\""));
        assert!(json.contains("\"ownerId\":2"));
    }

    #[test]
    fn test_managed_table_from_incomplete_row() {
        let row = Row::new().with("id", 7_i64);
        assert!(matches!(
            ManagedTable::from_row(&row),
            Err(ManagedStoreError::Decode(_))
        ));
    }
}
