//! SQL Identifier Sanitization
//!
//! Turns untrusted strings into identifiers and type literals that are safe to
//! splice into DDL and DML text. The identifier grammar is the real boundary:
//! nothing outside `[A-Za-z0-9_]` can reach generated SQL, so a value can never
//! terminate a quoted identifier, inject whitespace or end a statement. The
//! keyword block-list below is a best-effort extra layer on top of it and is not
//! meant to be exhaustive.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ManagedStoreError, Result};

/// Maximum identifier length accepted by [`quote_identifier`]
pub const MAX_IDENTIFIER_LEN: usize = 51;

/// Maximum length of a column type literal
pub const MAX_TYPE_LITERAL_LEN: usize = 64;

/// Keywords rejected as table or column names, compared case-insensitively
pub const RESERVED_WORDS: &[&str] = &[
    "ALL", "ALTER", "ANALYSE", "ANALYZE", "AND", "ANY", "ARRAY", "AS", "ASC",
    "ASYMMETRIC", "BOTH", "BY", "CASE", "CAST", "CHECK", "COLLATE", "COLUMN",
    "CONSTRAINT", "CREATE", "CURRENT_CATALOG", "CURRENT_DATE", "CURRENT_ROLE",
    "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "DEFAULT", "DEFERRABLE",
    "DELETE", "DESC", "DISTINCT", "DO", "DROP", "ELSE", "END", "EXCEPT", "FALSE",
    "FETCH", "FOR", "FOREIGN", "FROM", "GRANT", "GROUP", "HAVING", "IN", "INITIALLY",
    "INSERT", "INTERSECT", "INTO", "LATERAL", "LEADING", "LIMIT", "LOCALTIME",
    "LOCALTIMESTAMP", "NOT", "NULL", "OFFSET", "ON", "ONLY", "OR", "ORDER", "PLACING",
    "PRIMARY", "PUBLIC", "REFERENCES", "RETURNING", "REVOKE", "SELECT", "SESSION_USER",
    "SOME", "SYMMETRIC", "TABLE", "THEN", "TO", "TRAILING", "TRUE", "TRUNCATE", "UNION",
    "UNIQUE", "UPDATE", "USER", "USING", "VARIADIC", "WHEN", "WHERE", "WINDOW", "WITH",
];

/// Column types a managed table may declare, compared case-insensitively on the
/// name before any `(N)`. Each one reads back as a typed [`SqlValue`](crate::types::SqlValue).
pub const SUPPORTED_TYPES: &[&str] = &[
    "SMALLINT", "INT", "INTEGER", "BIGINT", "INT2", "INT4", "INT8",
    "SMALLSERIAL", "SERIAL", "BIGSERIAL", "SERIAL2", "SERIAL4", "SERIAL8",
    "REAL", "FLOAT", "FLOAT4", "FLOAT8", "NUMERIC", "DECIMAL",
    "BOOLEAN", "BOOL", "TIMESTAMP", "TIMESTAMPTZ", "DATE", "JSON", "JSONB",
    "TEXT", "VARCHAR", "CHAR", "CHARACTER", "BPCHAR",
];

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,50}$").expect("identifier pattern"));

static TYPE_CHARSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9()]+$").expect("type charset pattern"));

static TYPE_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*(\([0-9]+\))?$").expect("type shape pattern"));

/// A table or column name that passed [`quote_identifier`]
///
/// `Display` renders the double-quoted form used in SQL text; [`as_str`](Self::as_str)
/// returns the canonical unquoted name used for registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SafeIdentifier(String);

impl SafeIdentifier {
    /// Canonical unquoted name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form, ready to be placed in SQL text
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Unquoted name, consuming the identifier
    pub fn into_inner(self) -> String {
        self.0
    }

    /// `"schema"."name"`, so lookups never fall through to the search path
    pub fn qualified(&self, schema: &SafeIdentifier) -> String {
        format!("{}.{}", schema, self)
    }
}

impl fmt::Display for SafeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

/// A column type token that passed [`validate_data_type`]; emitted verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTypeLiteral(String);

impl SafeTypeLiteral {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafeTypeLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `name` is on the keyword block-list (case-insensitive)
pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS
        .iter()
        .any(|word| word.eq_ignore_ascii_case(name))
}

/// Validate a table or column name and wrap it in double quotes
///
/// Rules:
/// - Must not be empty or whitespace
/// - Must start with an ASCII letter or underscore
/// - Remaining characters (at most 50) are ASCII letters, digits or underscores
/// - Must not be a keyword from [`RESERVED_WORDS`], in any case
///
/// # Example
/// ```
/// use runtara_managed_tables::sql::quote_identifier;
///
/// let ident = quote_identifier("full_name").unwrap();
/// assert_eq!(ident.to_string(), "\"full_name\"");
/// assert_eq!(ident.as_str(), "full_name");
///
/// assert!(quote_identifier("users; DROP TABLE x").is_err());
/// assert!(quote_identifier("Select").is_err());
/// ```
pub fn quote_identifier(raw: &str) -> Result<SafeIdentifier> {
    check_grammar(raw)?;

    if is_reserved_word(raw) {
        return Err(ManagedStoreError::reserved_word(raw));
    }

    Ok(SafeIdentifier(raw.to_string()))
}

/// Validate the schema that holds the registry and every managed table
///
/// Same grammar as [`quote_identifier`] but without the keyword block-list, so the
/// default `public` is accepted. System schemas (`pg_*`, `information_schema`) are
/// refused.
pub fn quote_schema(raw: &str) -> Result<SafeIdentifier> {
    check_grammar(raw)?;

    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("pg_") || lower == "information_schema" {
        return Err(ManagedStoreError::invalid_identifier(format!(
            "'{}' is a system schema",
            raw
        )));
    }

    Ok(SafeIdentifier(raw.to_string()))
}

fn check_grammar(raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        return Err(ManagedStoreError::invalid_identifier(
            "Identifier cannot be empty",
        ));
    }

    if !IDENTIFIER_RE.is_match(raw) {
        return Err(ManagedStoreError::invalid_identifier(format!(
            "'{}' must start with a letter or underscore, contain only letters, digits and underscores, and be at most {} characters",
            raw, MAX_IDENTIFIER_LEN
        )));
    }

    Ok(())
}

/// Validate a column type such as `INT`, `VARCHAR(100)` or `TIMESTAMPTZ`
///
/// Only letters, digits and parentheses are admitted, in the shape `NAME` or
/// `NAME(DIGITS)`, and `NAME` must be one of [`SUPPORTED_TYPES`].
pub fn validate_data_type(raw: &str) -> Result<SafeTypeLiteral> {
    if raw.trim().is_empty() {
        return Err(ManagedStoreError::invalid_data_type(
            "Data type cannot be empty",
        ));
    }

    if !TYPE_CHARSET_RE.is_match(raw) {
        return Err(ManagedStoreError::invalid_data_type(format!(
            "'{}' may only contain letters, digits and parentheses",
            raw
        )));
    }

    if raw.len() > MAX_TYPE_LITERAL_LEN || !TYPE_SHAPE_RE.is_match(raw) {
        return Err(ManagedStoreError::invalid_data_type(format!(
            "'{}' is not of the form NAME or NAME(N)",
            raw
        )));
    }

    let base = raw.split('(').next().unwrap_or(raw);
    if !SUPPORTED_TYPES.iter().any(|ty| ty.eq_ignore_ascii_case(base)) {
        return Err(ManagedStoreError::invalid_data_type(format!(
            "'{}' is not a supported column type",
            raw
        )));
    }

    Ok(SafeTypeLiteral(raw.to_string()))
}
