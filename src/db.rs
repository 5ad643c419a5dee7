//! Database capability used by the registry and the store
//!
//! The [`Database`] trait is the only way statements reach the engine.
//! [`PgDatabase`] implements it on a `sqlx` PostgreSQL pool.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};

use crate::error::{ManagedStoreError, Result};
use crate::types::{Row, SqlValue};

/// Executes statements against a relational engine
///
/// Parameters are positional: the first value binds to `$1`.
pub trait Database: Send + Sync {
    /// Execute a statement that returns no rows; yields the affected row count
    fn execute(&self, sql: &str, params: &[SqlValue]) -> impl Future<Output = Result<u64>> + Send;

    /// Execute a query and materialize every returned row
    fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> impl Future<Output = Result<Vec<Row>>> + Send;
}

/// PostgreSQL implementation of [`Database`]
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PgDatabase {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Connect a new pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                ManagedStoreError::Connection(format!("Database connection failed: {}", e))
            })?;

        Ok(Self::new(pool))
    }

    /// Apply a deadline to every statement
    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn with_deadline<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match self.statement_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| ManagedStoreError::Timeout(limit))?
                .map_err(Into::into),
            None => fut.await.map_err(Into::into),
        }
    }

    fn bind_params<'q>(sql: &'q str, params: &'q [SqlValue]) -> Query<'q, Postgres, PgArguments> {
        params
            .iter()
            .fold(sqlx::query(sql), |query, value| Self::bind_value(query, value))
    }

    fn bind_value<'q>(
        query: Query<'q, Postgres, PgArguments>,
        value: &'q SqlValue,
    ) -> Query<'q, Postgres, PgArguments> {
        match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Decimal(v) => query.bind(*v),
            SqlValue::Boolean(v) => query.bind(*v),
            SqlValue::Timestamp(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Json(v) => query.bind(v),
        }
    }

    fn decode_row(row: &PgRow) -> Result<Row> {
        let mut decoded = Row::new();
        for (idx, column) in row.columns().iter().enumerate() {
            let value = Self::decode_cell(row, idx, column.type_info().name()).map_err(|e| {
                ManagedStoreError::decode(format!("column '{}': {}", column.name(), e))
            })?;
            decoded.push(column.name(), value);
        }
        Ok(decoded)
    }

    fn decode_cell(
        row: &PgRow,
        idx: usize,
        type_name: &str,
    ) -> std::result::Result<SqlValue, sqlx::Error> {
        let value = match type_name {
            "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(|v| SqlValue::Integer(v.into())),
            "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(|v| SqlValue::Integer(v.into())),
            "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(SqlValue::Integer),
            "FLOAT4" => row.try_get::<Option<f32>, _>(idx)?.map(|v| SqlValue::Float(v.into())),
            "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(SqlValue::Float),
            "NUMERIC" => row
                .try_get::<Option<rust_decimal::Decimal>, _>(idx)?
                .map(SqlValue::Decimal),
            "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(SqlValue::Boolean),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(idx)?
                .map(SqlValue::Timestamp),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(idx)?
                .map(|v| SqlValue::Timestamp(v.and_utc())),
            "DATE" => row
                .try_get::<Option<NaiveDate>, _>(idx)?
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|v| SqlValue::Timestamp(v.and_utc())),
            "JSON" | "JSONB" => row
                .try_get::<Option<serde_json::Value>, _>(idx)?
                .map(SqlValue::Json),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                row.try_get::<Option<String>, _>(idx)?.map(SqlValue::Text)
            }
            other => {
                return Err(sqlx::Error::Decode(
                    format!("unsupported column type {}", other).into(),
                ));
            }
        };

        Ok(value.unwrap_or(SqlValue::Null))
    }
}

impl Database for PgDatabase {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let query = Self::bind_params(sql, params);
        let result = self.with_deadline(query.execute(&self.pool)).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let query = Self::bind_params(sql, params);
        let rows = self.with_deadline(query.fetch_all(&self.pool)).await?;
        rows.iter().map(Self::decode_row).collect()
    }
}
