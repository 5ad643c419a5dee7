//! Error types for managed table operations

use std::time::Duration;

use thiserror::Error;

/// SQLSTATE reported by PostgreSQL for a unique constraint violation
pub const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE reported by PostgreSQL when a relation already exists
pub const DUPLICATE_TABLE: &str = "42P07";

/// Errors that can occur during managed table operations
#[derive(Debug, Error)]
pub enum ManagedStoreError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Reserved word: '{0}' cannot be used as an identifier")]
    ReservedWord(String),

    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    #[error("Table already registered: {0}")]
    DuplicateTable(String),

    #[error("Failed to create table '{table}': {message}")]
    SchemaCreationFailed { table: String, message: String },

    #[error("Statement failed: {message}")]
    StatementFailed {
        message: String,
        /// SQLSTATE code, when the engine reported one
        code: Option<String>,
    },

    #[error("Access denied: caller {caller_id} cannot access table '{table}'")]
    AccessDenied { table: String, caller_id: i64 },

    #[error("Empty payload: {0}")]
    EmptyPayload(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Statement timed out after {0:?}")]
    Timeout(Duration),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl ManagedStoreError {
    pub fn invalid_identifier(msg: impl Into<String>) -> Self {
        Self::InvalidIdentifier(msg.into())
    }

    pub fn reserved_word(word: impl Into<String>) -> Self {
        Self::ReservedWord(word.into())
    }

    pub fn invalid_data_type(msg: impl Into<String>) -> Self {
        Self::InvalidDataType(msg.into())
    }

    pub fn duplicate_table(table: impl Into<String>) -> Self {
        Self::DuplicateTable(table.into())
    }

    pub fn schema_creation_failed(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaCreationFailed {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn statement_failed(message: impl Into<String>) -> Self {
        Self::StatementFailed {
            message: message.into(),
            code: None,
        }
    }

    pub fn access_denied(table: impl Into<String>, caller_id: i64) -> Self {
        Self::AccessDenied {
            table: table.into(),
            caller_id,
        }
    }

    pub fn empty_payload(msg: impl Into<String>) -> Self {
        Self::EmptyPayload(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// SQLSTATE carried by a failed statement, if any
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::StatementFailed { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether the engine rejected the statement because of a unique constraint
    pub fn is_unique_violation(&self) -> bool {
        self.sql_state() == Some(UNIQUE_VIOLATION)
    }
}

impl From<sqlx::Error> for ManagedStoreError {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned());

        Self::StatementFailed {
            message: err.to_string(),
            code,
        }
    }
}

pub type Result<T> = std::result::Result<T, ManagedStoreError>;
