//! Ownership registry
//!
//! Persists which caller owns which managed table and answers access questions.
//! The registry's own storage table is never reachable by non-privileged callers.
//! It lives in the same schema as the tables it tracks.

use crate::db::Database;
use crate::error::{DUPLICATE_TABLE, ManagedStoreError, Result};
use crate::sql::ddl::DdlGenerator;
use crate::sql::sanitize::{SafeIdentifier, quote_identifier, quote_schema};
use crate::types::{ManagedTable, SqlValue};

/// Persistent mapping of managed table name to owner id
#[derive(Debug, Clone)]
pub struct OwnershipRegistry<D> {
    db: D,
    schema: SafeIdentifier,
    table: SafeIdentifier,
}

impl<D: Database> OwnershipRegistry<D> {
    /// Create a registry stored in `schema.registry_table`
    ///
    /// The table name goes through the same sanitizer as caller-supplied names.
    pub fn new(db: D, schema: &str, registry_table: &str) -> Result<Self> {
        let schema = quote_schema(schema)?;
        let table = quote_identifier(registry_table)?;
        Ok(Self { db, schema, table })
    }

    /// Schema holding the registry and every managed table
    pub fn schema(&self) -> &SafeIdentifier {
        &self.schema
    }

    /// Name of the registry's own storage table
    pub fn table_name(&self) -> &str {
        self.table.as_str()
    }

    /// Sanitized identifier of the registry table
    pub fn table(&self) -> &SafeIdentifier {
        &self.table
    }

    /// Whether `name` addresses the registry's storage (case-insensitive)
    pub fn is_registry_table(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(self.table.as_str())
    }

    /// Create the registry table if it does not exist
    ///
    /// Safe to call on every start-up. PostgreSQL can report a concurrent
    /// `CREATE TABLE IF NOT EXISTS` as a duplicate; that counts as success.
    pub async fn ensure_store_exists(&self) -> Result<()> {
        let sql = DdlGenerator::new(&self.schema, &self.table).generate_registry_table();

        match self.db.execute(&sql, &[]).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() || e.sql_state() == Some(DUPLICATE_TABLE) => {
                tracing::debug!(registry = %self.table, "registry table created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Record `owner_id` as the owner of `table`
    pub async fn register(&self, table: &SafeIdentifier, owner_id: i64) -> Result<ManagedTable> {
        let sql = format!(
            "INSERT INTO {} (table_name, owner_id) VALUES ($1, $2) \
             RETURNING id, table_name, owner_id, created_at",
            self.relation()
        );
        let params = [SqlValue::from(table.as_str()), SqlValue::Integer(owner_id)];

        let rows = self.db.fetch_all(&sql, &params).await.map_err(|e| {
            if e.is_unique_violation() {
                ManagedStoreError::duplicate_table(table.as_str())
            } else {
                e
            }
        })?;

        let row = rows.first().ok_or_else(|| {
            ManagedStoreError::decode(format!("registration of '{}' returned no row", table.as_str()))
        })?;
        ManagedTable::from_row(row)
    }

    /// Decide whether a caller may touch `table_name`
    ///
    /// Privileged callers are always allowed. Otherwise the registry table is
    /// off limits, and any other table requires a registry row naming the caller
    /// as owner.
    pub async fn can_access(&self, table_name: &str, caller_id: i64, is_privileged: bool) -> Result<bool> {
        if is_privileged {
            return Ok(true);
        }

        if self.is_registry_table(table_name) {
            return Ok(false);
        }

        let sql = format!(
            "SELECT 1 AS allowed FROM {} WHERE table_name = $1 AND owner_id = $2 LIMIT 1",
            self.relation()
        );
        let params = [SqlValue::from(table_name), SqlValue::Integer(caller_id)];

        let rows = self.db.fetch_all(&sql, &params).await?;
        Ok(!rows.is_empty())
    }

    /// Get the registry record for a table
    pub async fn lookup(&self, table_name: &str) -> Result<Option<ManagedTable>> {
        let sql = format!(
            "SELECT id, table_name, owner_id, created_at FROM {} WHERE table_name = $1",
            self.relation()
        );

        let rows = self.db.fetch_all(&sql, &[SqlValue::from(table_name)]).await?;
        rows.first().map(ManagedTable::from_row).transpose()
    }

    /// List registered tables, newest first, optionally restricted to one owner
    pub async fn list(&self, owner_id: Option<i64>) -> Result<Vec<ManagedTable>> {
        let rows = match owner_id {
            Some(owner) => {
                let sql = format!(
                    "SELECT id, table_name, owner_id, created_at FROM {} \
                     WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
                    self.relation()
                );
                self.db.fetch_all(&sql, &[SqlValue::Integer(owner)]).await?
            }
            None => {
                let sql = format!(
                    "SELECT id, table_name, owner_id, created_at FROM {} \
                     ORDER BY created_at DESC, id DESC",
                    self.relation()
                );
                self.db.fetch_all(&sql, &[]).await?
            }
        };

        rows.iter().map(ManagedTable::from_row).collect()
    }

    fn relation(&self) -> String {
        self.table.qualified(&self.schema)
    }
}
