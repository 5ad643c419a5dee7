//! DDL Generation for Managed Tables
//!
//! Generates PostgreSQL DDL statements for managed tables and the ownership registry.
//! DDL cannot be parameter-bound, so every name and type reaching these functions has
//! already been through the sanitizer. Every table is schema-qualified.

use crate::sql::sanitize::SafeIdentifier;
use crate::types::{SURROGATE_KEY_COLUMN, SanitizedColumn};

/// Column type of the surrogate key injected into every managed table
pub const SURROGATE_KEY_TYPE: &str = "SERIAL PRIMARY KEY";

/// DDL Generator for managed tables
pub struct DdlGenerator<'a> {
    schema: &'a SafeIdentifier,
    registry_table: &'a SafeIdentifier,
}

impl<'a> DdlGenerator<'a> {
    /// Create a new DDL generator for tables in `schema`
    pub fn new(schema: &'a SafeIdentifier, registry_table: &'a SafeIdentifier) -> Self {
        Self {
            schema,
            registry_table,
        }
    }

    /// Generate the idempotent CREATE TABLE statement for the ownership registry
    pub fn generate_registry_table(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             id SERIAL PRIMARY KEY, \
             table_name VARCHAR(63) UNIQUE NOT NULL, \
             owner_id BIGINT NOT NULL, \
             created_at TIMESTAMPTZ NOT NULL DEFAULT NOW())",
            self.registry_table.qualified(self.schema)
        )
    }

    /// Generate CREATE TABLE for a managed table
    ///
    /// The surrogate `id` key always comes first, ahead of the caller's columns.
    pub fn generate_create_table(&self, table: &SafeIdentifier, columns: &[SanitizedColumn]) -> String {
        let mut column_defs = Vec::with_capacity(columns.len() + 1);
        column_defs.push(format!("{} {}", SURROGATE_KEY_COLUMN, SURROGATE_KEY_TYPE));

        for col in columns {
            column_defs.push(Self::format_column_definition(col));
        }

        format!(
            "CREATE TABLE {} ({})",
            table.qualified(self.schema),
            column_defs.join(", ")
        )
    }

    /// Generate DROP TABLE statement
    pub fn generate_drop_table(&self, table: &SafeIdentifier) -> String {
        format!("DROP TABLE IF EXISTS {}", table.qualified(self.schema))
    }

    /// Format a single column definition for CREATE TABLE
    pub fn format_column_definition(col: &SanitizedColumn) -> String {
        format!("{} {}", col.name, col.data_type)
    }
}
