//! Configuration for ManagedTableStore
//!
//! Provides a builder pattern for configuring the managed table store.

use std::time::Duration;

/// Default name of the ownership registry table
pub const DEFAULT_REGISTRY_TABLE: &str = "app_managed_tables";

/// Default schema for the registry and managed tables
pub const DEFAULT_SCHEMA: &str = "public";

/// Configuration for the managed table store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL database URL
    pub database_url: String,
    /// Schema holding the registry and every managed table (default: "public")
    pub schema: String,
    /// Name of the ownership registry table (default: "app_managed_tables")
    pub registry_table: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// Row cap applied to `query_data` (default: 10)
    pub query_row_limit: i64,
    /// Deadline applied to every statement, if set
    pub statement_timeout: Option<Duration>,
    /// Drop a freshly created table when registering it fails (default: true)
    pub compensate_failed_registration: bool,
}

impl StoreConfig {
    /// Create a new configuration builder
    pub fn builder(database_url: impl Into<String>) -> StoreConfigBuilder {
        StoreConfigBuilder::new(database_url)
    }
}

/// Builder for StoreConfig
#[derive(Debug)]
pub struct StoreConfigBuilder {
    database_url: String,
    schema: String,
    registry_table: String,
    max_connections: u32,
    query_row_limit: i64,
    statement_timeout: Option<Duration>,
    compensate_failed_registration: bool,
}

impl StoreConfigBuilder {
    /// Create a new builder with the database URL
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            schema: DEFAULT_SCHEMA.to_string(),
            registry_table: DEFAULT_REGISTRY_TABLE.to_string(),
            max_connections: 5,
            query_row_limit: 10,
            statement_timeout: None,
            compensate_failed_registration: true,
        }
    }

    /// Set the schema for the registry and managed tables (default: "public")
    ///
    /// The schema must already exist.
    pub fn schema(mut self, name: impl Into<String>) -> Self {
        self.schema = name.into();
        self
    }

    /// Set the registry table name (default: "app_managed_tables")
    pub fn registry_table(mut self, name: impl Into<String>) -> Self {
        self.registry_table = name.into();
        self
    }

    /// Set the maximum number of pooled connections (default: 5)
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the row cap for `query_data` (default: 10, must not be negative)
    pub fn query_row_limit(mut self, limit: i64) -> Self {
        self.query_row_limit = limit;
        self
    }

    /// Apply a deadline to every statement
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// Enable or disable the compensating drop after a failed registration (default: true)
    pub fn compensate_failed_registration(mut self, enabled: bool) -> Self {
        self.compensate_failed_registration = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> StoreConfig {
        StoreConfig {
            database_url: self.database_url,
            schema: self.schema,
            registry_table: self.registry_table,
            max_connections: self.max_connections,
            query_row_limit: self.query_row_limit,
            statement_timeout: self.statement_timeout,
            compensate_failed_registration: self.compensate_failed_registration,
        }
    }
}
