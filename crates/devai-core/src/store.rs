//! Generic table store collaborator.
//!
//! The durable store is reached through a small relational interface:
//! select / insert / update / delete by table, equality filter and ordering.
//! Rows travel as JSON objects so that a REST backend and an in-memory fake
//! can implement the same trait.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A single table row.
pub type Row = Map<String, Value>;

pub const USERS_TABLE: &str = "users";
pub const SESSIONS_TABLE: &str = "chat_sessions";
pub const MESSAGES_TABLE: &str = "chat_messages";

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether `row` satisfies this filter.
    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column) == Some(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// A select query against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The durable relational store.
///
/// Every failure to reach the store or to execute a call is reported as
/// [`ChatError::Persistence`](crate::error::ChatError::Persistence).
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Returns the rows matching `query`, ordered and limited as requested.
    async fn select(&self, query: Query) -> Result<Vec<Row>>;

    /// Inserts a row and returns it as stored (with generated columns).
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    /// Applies `patch` to every matching row and returns the updated rows.
    async fn update(&self, table: &str, filters: Vec<Filter>, patch: Row) -> Result<Vec<Row>>;

    /// Deletes every matching row and returns how many were removed.
    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<usize>;
}

/// Reads a string column, tolerating missing or non-string values.
pub fn row_str(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_builder() {
        let query = Query::table(MESSAGES_TABLE)
            .filter("session_id", "abc")
            .order_by("order_index", Direction::Ascending)
            .limit(5);
        assert_eq!(query.table, "chat_messages");
        assert_eq!(query.filters, vec![Filter::eq("session_id", "abc")]);
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn test_filter_matches_by_json_equality() {
        let row = json!({"session_id": "abc", "order_index": 2})
            .as_object()
            .cloned()
            .unwrap();
        assert!(Filter::eq("order_index", 2).matches(&row));
        assert!(!Filter::eq("order_index", "2").matches(&row));
        assert!(!Filter::eq("missing", "x").matches(&row));
    }
}
