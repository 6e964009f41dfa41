//! In-memory table store.
//!
//! Mirrors the relational behaviour the application relies on: generated
//! ids, the `(session_id, order_index)` unique key on messages and cascading
//! deletes from sessions to messages. Outages can be simulated with
//! [`InMemoryTableStore::set_unavailable`].

use async_trait::async_trait;
use devai_core::store::{
    Direction, Filter, MESSAGES_TABLE, Query, Row, SESSIONS_TABLE, TableStore,
};
use devai_core::{ChatError, Result};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

/// Unique keys enforced on insert, per table.
const UNIQUE_KEYS: &[(&str, &[&str])] = &[(MESSAGES_TABLE, &["session_id", "order_index"])];

/// Child tables removed together with their parent row.
const CASCADES: &[(&str, &str, &str)] = &[(SESSIONS_TABLE, MESSAGES_TABLE, "session_id")];

#[derive(Default)]
pub struct InMemoryTableStore {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with a persistence error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Snapshot of a table's rows in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .map(|tables| tables.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Number of calls made against the store, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    fn begin(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<Row>>>> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(ChatError::persistence("store unavailable"));
        }
        self.tables
            .lock()
            .map_err(|_| ChatError::internal("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn select(&self, query: Query) -> Result<Vec<Row>> {
        let tables = self.begin()?;
        let mut rows: Vec<Row> = tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(&query.filters, row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row> {
        let mut tables = self.begin()?;
        if !row.get("id").is_some_and(|id| !id.is_null()) {
            row.insert("id".to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
        }

        let rows = tables.entry(table.to_string()).or_default();
        for (unique_table, columns) in UNIQUE_KEYS {
            if *unique_table != table {
                continue;
            }
            let clash = rows
                .iter()
                .any(|existing| columns.iter().all(|c| existing.get(*c) == row.get(*c)));
            if clash {
                return Err(ChatError::persistence(format!(
                    "duplicate key value violates unique constraint on {}({})",
                    table,
                    columns.join(", ")
                )));
            }
        }

        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, filters: Vec<Filter>, patch: Row) -> Result<Vec<Row>> {
        let mut tables = self.begin()?;
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| matches_all(&filters, row)) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<usize> {
        let mut tables = self.begin()?;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };

        let (removed, kept): (Vec<Row>, Vec<Row>) =
            rows.drain(..).partition(|row| matches_all(&filters, row));
        *rows = kept;

        for (parent, child, foreign_key) in CASCADES {
            if *parent != table {
                continue;
            }
            let parent_ids: Vec<&Value> = removed.iter().filter_map(|r| r.get("id")).collect();
            if let Some(children) = tables.get_mut(*child) {
                children.retain(|c| !c.get(*foreign_key).is_some_and(|v| parent_ids.contains(&v)));
            }
        }

        Ok(removed.len())
    }
}

fn matches_all(filters: &[Filter], row: &Row) -> bool {
    filters.iter().all(|f| f.matches(row))
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
