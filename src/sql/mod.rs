//! SQL utilities for managed tables
//!
//! Provides identifier sanitization and DDL/DML composition.

pub mod ddl;
pub mod dml;
pub mod sanitize;

pub use ddl::DdlGenerator;
pub use dml::{build_insert, build_select_all};
pub use sanitize::{
    RESERVED_WORDS, SUPPORTED_TYPES, SafeIdentifier, SafeTypeLiteral, is_reserved_word,
    quote_identifier, quote_schema, validate_data_type,
};
