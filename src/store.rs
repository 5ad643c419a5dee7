//! ManagedTableStore - Main entry point for owner-scoped table management
//!
//! This module provides the `ManagedTableStore` struct that creates tables on behalf
//! of callers, records their owner, and gates inserts and queries on ownership.

use std::collections::{BTreeMap, HashSet};

use sqlx::PgPool;

use crate::config::StoreConfig;
use crate::db::{Database, PgDatabase};
use crate::error::{ManagedStoreError, Result};
use crate::registry::OwnershipRegistry;
use crate::sql::ddl::DdlGenerator;
use crate::sql::dml::{build_insert, build_select_all};
use crate::sql::sanitize::{SafeIdentifier, quote_identifier};
use crate::types::{Caller, CreateTableRequest, ManagedTable, Row, SanitizedColumn, SqlValue, infer_row};

/// Owner-scoped runtime table store
///
/// Every schema or data operation is authorized against the ownership registry
/// on each call; nothing is cached between requests, so a single store can be
/// shared across tasks.
pub struct ManagedTableStore<D = PgDatabase> {
    /// Database capability
    db: D,
    /// Ownership registry sharing the same database
    registry: OwnershipRegistry<D>,
    /// Store configuration
    config: StoreConfig,
}

impl ManagedTableStore<PgDatabase> {
    /// Create a new ManagedTableStore from configuration
    ///
    /// This will:
    /// 1. Connect to the database
    /// 2. Create the registry table if it doesn't exist
    pub async fn new(config: StoreConfig) -> Result<Self> {
        let db = PgDatabase::connect(&config.database_url, config.max_connections)
            .await?
            .with_statement_timeout(config.statement_timeout);

        Self::with_database(db, config).await
    }

    /// Create a new ManagedTableStore from an existing pool
    ///
    /// Use this when you already have a connection pool and want to
    /// share it with the store.
    pub async fn from_pool(pool: PgPool, config: StoreConfig) -> Result<Self> {
        let db = PgDatabase::new(pool).with_statement_timeout(config.statement_timeout);
        Self::with_database(db, config).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        self.db.pool()
    }
}

impl<D: Database + Clone> ManagedTableStore<D> {
    /// Create a store on any database capability
    ///
    /// Validates the configured schema, registry name and row cap, then makes sure
    /// the registry table exists.
    pub async fn with_database(db: D, config: StoreConfig) -> Result<Self> {
        if config.query_row_limit < 0 {
            return Err(ManagedStoreError::invalid_config(format!(
                "query_row_limit must not be negative, got {}",
                config.query_row_limit
            )));
        }

        let registry = OwnershipRegistry::new(db.clone(), &config.schema, &config.registry_table)?;
        registry.ensure_store_exists().await?;

        Ok(Self {
            db,
            registry,
            config,
        })
    }
}

impl<D: Database> ManagedTableStore<D> {
    /// Get a reference to the configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get a reference to the ownership registry
    pub fn registry(&self) -> &OwnershipRegistry<D> {
        &self.registry
    }

    // =========================================================================
    // Schema Operations
    // =========================================================================

    /// Create a new managed table owned by `caller`
    ///
    /// This will:
    /// 1. Validate the table name and every column name and type
    /// 2. Create the table with a leading surrogate `id` key
    /// 3. Register the caller as the table's owner
    ///
    /// Nothing is executed if validation fails. If registration fails after the
    /// table was created, the table is dropped again unless
    /// `compensate_failed_registration` is disabled.
    #[tracing::instrument(
        name = "managed_tables.create_table",
        skip_all,
        fields(table = %request.table_name, caller_id = caller.id)
    )]
    pub async fn create_table(&self, request: CreateTableRequest, caller: &Caller) -> Result<ManagedTable> {
        if request.columns.is_empty() {
            return Err(ManagedStoreError::empty_payload(format!(
                "Table '{}' needs at least one column",
                request.table_name
            )));
        }

        let table = quote_identifier(&request.table_name)?;
        let columns = Self::sanitize_columns(&request)?;

        if self.registry.is_registry_table(table.as_str()) {
            tracing::warn!("attempt to create a table named after the registry");
            return Err(ManagedStoreError::access_denied(table.as_str(), caller.id));
        }

        if self.registry.lookup(table.as_str()).await?.is_some() {
            return Err(ManagedStoreError::duplicate_table(table.as_str()));
        }

        let ddl = DdlGenerator::new(self.registry.schema(), self.registry.table());
        let create_sql = ddl.generate_create_table(&table, &columns);
        tracing::debug!(sql = %create_sql, "creating managed table");

        self.db.execute(&create_sql, &[]).await.map_err(|e| {
            ManagedStoreError::schema_creation_failed(table.as_str(), e.to_string())
        })?;

        match self.registry.register(&table, caller.id).await {
            Ok(managed) => {
                tracing::info!(table_id = managed.table_id, "managed table created");
                Ok(managed)
            }
            Err(e) => {
                if self.config.compensate_failed_registration {
                    self.drop_unregistered(&ddl, &table).await;
                } else {
                    tracing::warn!(error = %e, "registration failed; table left unregistered");
                }
                Err(e)
            }
        }
    }

    /// List managed tables visible to `caller`
    ///
    /// Privileged callers see every table; others see the tables they own.
    pub async fn list_tables(&self, caller: &Caller) -> Result<Vec<ManagedTable>> {
        let owner = (!caller.privileged).then_some(caller.id);
        self.registry.list(owner).await
    }

    // =========================================================================
    // Data Operations
    // =========================================================================

    /// Insert one row of typed values
    ///
    /// Authorization is checked before any SQL is built. Values are bound as
    /// parameters; only the sanitized table and column names appear in SQL text.
    #[tracing::instrument(
        name = "managed_tables.insert_data",
        skip_all,
        fields(table = %table_name, caller_id = caller.id, columns = data.len())
    )]
    pub async fn insert_data(
        &self,
        table_name: &str,
        data: BTreeMap<String, SqlValue>,
        caller: &Caller,
    ) -> Result<u64> {
        self.authorize(table_name, caller).await?;

        let table = quote_identifier(table_name)?;

        if data.is_empty() {
            return Err(ManagedStoreError::empty_payload(format!(
                "No values supplied for table '{}'",
                table_name
            )));
        }

        let values = data
            .into_iter()
            .map(|(column, value)| Ok((quote_identifier(&column)?, value)))
            .collect::<Result<Vec<_>>>()?;

        let (insert_sql, params) = build_insert(self.registry.schema(), &table, &values);
        tracing::debug!(sql = %insert_sql, "inserting row");

        self.db.execute(&insert_sql, &params).await
    }

    /// Insert one row of untyped text values
    ///
    /// Each value is inferred as integer, boolean, date/time or text, in that order.
    pub async fn insert_text<K, V>(
        &self,
        table_name: &str,
        data: impl IntoIterator<Item = (K, V)>,
        caller: &Caller,
    ) -> Result<u64>
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        self.insert_data(table_name, infer_row(data), caller).await
    }

    /// Read up to `query_row_limit` rows from a table
    #[tracing::instrument(
        name = "managed_tables.query_data",
        skip_all,
        fields(table = %table_name, caller_id = caller.id)
    )]
    pub async fn query_data(&self, table_name: &str, caller: &Caller) -> Result<Vec<Row>> {
        self.authorize(table_name, caller).await?;

        let table = quote_identifier(table_name)?;
        let select_sql = build_select_all(self.registry.schema(), &table);
        tracing::debug!(sql = %select_sql, "querying rows");

        self.db
            .fetch_all(&select_sql, &[SqlValue::Integer(self.config.query_row_limit)])
            .await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    async fn authorize(&self, table_name: &str, caller: &Caller) -> Result<()> {
        if self
            .registry
            .can_access(table_name, caller.id, caller.privileged)
            .await?
        {
            Ok(())
        } else {
            tracing::warn!("access denied");
            Err(ManagedStoreError::access_denied(table_name, caller.id))
        }
    }

    fn sanitize_columns(request: &CreateTableRequest) -> Result<Vec<SanitizedColumn>> {
        let columns = request
            .columns
            .iter()
            .map(|col| col.sanitize())
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::with_capacity(columns.len());
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(ManagedStoreError::invalid_identifier(format!(
                    "Column '{}' is specified more than once",
                    col.name.as_str()
                )));
            }
        }

        Ok(columns)
    }

    async fn drop_unregistered(&self, ddl: &DdlGenerator<'_>, table: &SafeIdentifier) {
        let drop_sql = ddl.generate_drop_table(table);
        match self.db.execute(&drop_sql, &[]).await {
            Ok(_) => tracing::warn!("registration failed; dropped the new table"),
            Err(e) => tracing::warn!(error = %e, "registration failed and the new table could not be dropped"),
        }
    }
}
