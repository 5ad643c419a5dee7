//! # runtara-managed-tables
//!
//! Owner-scoped runtime tables on PostgreSQL.
//!
//! Callers create tables at runtime, insert rows and read them back. Every table
//! is recorded in an ownership registry together with the id of the caller that
//! created it, and only that caller (or a privileged one) may touch it afterwards.
//!
//! ## Features
//!
//! - **Identifier Sanitization**: Table and column names are validated against a strict
//!   grammar and a reserved-word list, then double-quoted before reaching SQL text
//! - **Type Literal Validation**: Column types are limited to `NAME` or `NAME(N)` from a
//!   fixed list of types that read back as typed values
//! - **Schema Qualification**: Every statement names tables as `"schema"."table"`
//! - **Ownership Registry**: One registry row per managed table, keyed by name
//! - **Parameter Binding**: Row values are always bound, never spliced into SQL
//! - **Value Inference**: Untyped text input is inferred as integer, boolean, date/time or text
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use runtara_managed_tables::{Caller, CreateTableRequest, ManagedTableStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::builder("postgres://localhost/mydb").build();
//!     let store = ManagedTableStore::new(config).await?;
//!
//!     let owner = Caller::user(5);
//!
//!     // Create a table; an `id SERIAL PRIMARY KEY` column is added automatically
//!     store
//!         .create_table(
//!             CreateTableRequest::new("contacts", vec![])
//!                 .column("full_name", "VARCHAR(100)")
//!                 .column("age", "INT"),
//!             &owner,
//!         )
//!         .await?;
//!
//!     // Insert untyped values; "36" is stored as an integer
//!     store
//!         .insert_text("contacts", [("full_name", "Ada"), ("age", "36")], &owner)
//!         .await?;
//!
//!     // Read back (capped at `query_row_limit` rows)
//!     for row in store.query_data("contacts", &owner).await? {
//!         println!("{}", serde_json::to_string(&row)?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use std::time::Duration;
//! use runtara_managed_tables::StoreConfig;
//!
//! let config = StoreConfig::builder("postgres://localhost/mydb")
//!     .schema("public")                        // Schema for the registry and tables (default)
//!     .registry_table("app_managed_tables")    // Default registry table name
//!     .query_row_limit(10)                     // Row cap for query_data (default)
//!     .statement_timeout(Duration::from_secs(5))
//!     .compensate_failed_registration(true)    // Drop tables whose registration failed (default)
//!     .build();
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod registry;
pub mod sql;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use config::{StoreConfig, StoreConfigBuilder};
pub use db::{Database, PgDatabase};
pub use error::{ManagedStoreError, Result};
pub use registry::OwnershipRegistry;
pub use store::ManagedTableStore;
pub use types::{Caller, ColumnSpec, CreateTableRequest, ManagedTable, Row, SqlValue};

// Re-export SQL utilities for advanced users
pub use sql::ddl::DdlGenerator;
pub use sql::sanitize::{quote_identifier, quote_schema, validate_data_type};
