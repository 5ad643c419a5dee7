//! DML composition for managed tables
//!
//! Identifiers are spliced in their quoted, schema-qualified form; values are always
//! positional parameters, except NULL which is written as a literal so it stays untyped.

use crate::sql::sanitize::SafeIdentifier;
use crate::types::SqlValue;

/// Build a parameterized INSERT
///
/// Returns the statement and the parameters to bind, in placeholder order.
pub fn build_insert(
    schema: &SafeIdentifier,
    table: &SafeIdentifier,
    values: &[(SafeIdentifier, SqlValue)],
) -> (String, Vec<SqlValue>) {
    let mut column_names = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());

    for (column, value) in values {
        column_names.push(column.quoted());
        if value.is_null() {
            placeholders.push("NULL".to_string());
        } else {
            params.push(value.clone());
            placeholders.push(format!("${}", params.len()));
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.qualified(schema),
        column_names.join(", "),
        placeholders.join(", ")
    );

    (sql, params)
}

/// Build the capped SELECT used by `query_data`; the row cap is bound as `$1`
pub fn build_select_all(schema: &SafeIdentifier, table: &SafeIdentifier) -> String {
    format!("SELECT * FROM {} LIMIT $1", table.qualified(schema))
}
