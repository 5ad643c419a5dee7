//! In-memory [`Database`] used by unit tests
//!
//! Understands exactly the statements this crate composes: registry DDL and
//! queries, managed-table CREATE/DROP, parameterized INSERT and the capped SELECT.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};

use crate::db::Database;
use crate::error::{ManagedStoreError, Result, UNIQUE_VIOLATION};
use crate::types::{ManagedTable, Row, SqlValue};

const UNDEFINED_TABLE: &str = "42P01";

#[derive(Debug, Default)]
struct State {
    statements: Vec<(String, Vec<SqlValue>)>,
    failures: Vec<(String, Option<String>)>,
    registry: Vec<ManagedTable>,
    tables: BTreeMap<String, Table>,
}

#[derive(Debug, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
    next_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Every statement seen so far, with its parameters
    pub fn statements(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.lock().statements.clone()
    }

    /// Fail the next statement containing `pattern`
    pub fn fail_next(&self, pattern: &str, code: Option<&str>) {
        self.lock()
            .failures
            .push((pattern.to_string(), code.map(str::to_string)));
    }

    /// Insert a registry row directly, bypassing every check
    pub fn insert_registry_row(&self, table_name: &str, owner_id: i64) {
        let mut state = self.lock();
        let table_id = state.registry.len() as i64 + 1;
        state.registry.push(ManagedTable {
            table_id,
            table_name: table_name.to_string(),
            owner_id,
            created_at: registered_at(table_id),
        });
    }

    /// Whether a managed table physically exists
    pub fn has_table(&self, name: &str) -> bool {
        self.lock().tables.contains_key(name)
    }

    /// Rows stored in a managed table
    pub fn rows(&self, name: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn begin(&self, sql: &str, params: &[SqlValue]) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.statements.push((sql.to_string(), params.to_vec()));

        if let Some(pos) = state
            .failures
            .iter()
            .position(|(pattern, _)| sql.contains(pattern.as_str()))
        {
            let (_, code) = state.failures.remove(pos);
            return Err(failure("injected failure", code.as_deref()));
        }

        Ok(state)
    }
}

fn failure(message: &str, code: Option<&str>) -> ManagedStoreError {
    ManagedStoreError::StatementFailed {
        message: message.to_string(),
        code: code.map(str::to_string),
    }
}

fn registered_at(table_id: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(table_id)
}

/// Names appearing between double quotes, in order, without the leading schema
fn quoted_names(sql: &str) -> Vec<String> {
    assert!(sql.contains("\".\""), "unqualified statement: {}", sql);
    sql.split('"').skip(1).step_by(2).skip(1).map(str::to_string).collect()
}

fn param(params: &[SqlValue], idx: usize) -> SqlValue {
    params.get(idx).cloned().unwrap_or(SqlValue::Null)
}

fn registry_row(table: &ManagedTable) -> Row {
    Row::new()
        .with("id", table.table_id)
        .with("table_name", table.table_name.as_str())
        .with("owner_id", table.owner_id)
        .with("created_at", table.created_at)
}

impl Database for MemoryDatabase {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut state = self.begin(sql, params)?;

        if sql.starts_with("CREATE TABLE IF NOT EXISTS") {
            return Ok(0);
        }

        if sql.starts_with("CREATE TABLE") {
            let names = quoted_names(sql);
            let table = names[0].clone();
            if state.tables.contains_key(&table) {
                return Err(failure("relation already exists", Some("42P07")));
            }
            let mut columns = vec!["id".to_string()];
            columns.extend(names.into_iter().skip(1));
            state.tables.insert(
                table,
                Table {
                    columns,
                    rows: Vec::new(),
                    next_id: 1,
                },
            );
            return Ok(0);
        }

        if sql.starts_with("DROP TABLE IF EXISTS") {
            let table = quoted_names(sql).remove(0);
            state.tables.remove(&table);
            return Ok(0);
        }

        if sql.starts_with("INSERT INTO") {
            let names = quoted_names(sql);
            let table = state
                .tables
                .get_mut(&names[0])
                .ok_or_else(|| failure("relation does not exist", Some(UNDEFINED_TABLE)))?;

            let values_list = sql
                .split("VALUES (")
                .nth(1)
                .and_then(|rest| rest.strip_suffix(')'))
                .unwrap_or_default();
            let mut given = BTreeMap::new();
            for (column, token) in names[1..].iter().zip(values_list.split(", ")) {
                if !table.columns.contains(column) {
                    return Err(failure("column does not exist", Some("42703")));
                }
                let value = match token.strip_prefix('$') {
                    Some(n) => param(params, n.parse::<usize>().unwrap() - 1),
                    None => SqlValue::Null,
                };
                given.insert(column.clone(), value);
            }

            let id = table.next_id;
            table.next_id += 1;
            let row = table
                .columns
                .iter()
                .map(|c| {
                    let value = if c == "id" {
                        SqlValue::Integer(id)
                    } else {
                        given.remove(c).unwrap_or(SqlValue::Null)
                    };
                    (c.clone(), value)
                })
                .collect();
            table.rows.push(row);
            return Ok(1);
        }

        panic!("MemoryDatabase cannot execute: {}", sql);
    }

    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let mut state = self.begin(sql, params)?;

        // Registry insert
        if sql.starts_with("INSERT INTO") {
            let table_name = param(params, 0).as_str().unwrap_or_default().to_string();
            let owner_id = param(params, 1).as_i64().unwrap_or_default();
            if state.registry.iter().any(|t| t.table_name == table_name) {
                return Err(failure("duplicate key value", Some(UNIQUE_VIOLATION)));
            }
            let table_id = state.registry.len() as i64 + 1;
            let table = ManagedTable {
                table_id,
                table_name,
                owner_id,
                created_at: registered_at(table_id),
            };
            let row = registry_row(&table);
            state.registry.push(table);
            return Ok(vec![row]);
        }

        if sql.starts_with("SELECT 1 AS allowed") {
            let table_name = param(params, 0);
            let owner_id = param(params, 1);
            let allowed = state.registry.iter().any(|t| {
                Some(t.table_name.as_str()) == table_name.as_str()
                    && Some(t.owner_id) == owner_id.as_i64()
            });
            return Ok(if allowed {
                vec![Row::new().with("allowed", 1_i64)]
            } else {
                Vec::new()
            });
        }

        if sql.starts_with("SELECT id, table_name, owner_id, created_at") {
            let mut tables: Vec<&ManagedTable> = if sql.contains("WHERE table_name = $1") {
                let name = param(params, 0);
                state
                    .registry
                    .iter()
                    .filter(|t| Some(t.table_name.as_str()) == name.as_str())
                    .collect()
            } else if sql.contains("WHERE owner_id = $1") {
                let owner = param(params, 0).as_i64();
                state
                    .registry
                    .iter()
                    .filter(|t| Some(t.owner_id) == owner)
                    .collect()
            } else {
                state.registry.iter().collect()
            };
            if sql.contains("ORDER BY created_at DESC") {
                tables.sort_by(|a, b| (b.created_at, b.table_id).cmp(&(a.created_at, a.table_id)));
            }
            return Ok(tables.into_iter().map(registry_row).collect());
        }

        if sql.starts_with("SELECT * FROM") {
            let name = quoted_names(sql).remove(0);
            let limit = param(params, 0).as_i64().unwrap_or(i64::MAX).max(0) as usize;
            let table = state
                .tables
                .get(&name)
                .ok_or_else(|| failure("relation does not exist", Some(UNDEFINED_TABLE)))?;
            return Ok(table.rows.iter().take(limit).cloned().collect());
        }

        panic!("MemoryDatabase cannot query: {}", sql);
    }
}
