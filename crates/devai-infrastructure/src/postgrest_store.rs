//! PostgREST-dialect table store (Supabase REST API).

use async_trait::async_trait;
use devai_core::store::{Direction, Filter, Query, Row, TableStore};
use devai_core::{ChatError, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Table store speaking the PostgREST REST dialect.
///
/// Requests go to `{base_url}/rest/v1/{table}` with `col=eq.value` filters.
/// Every failure (transport, non-2xx, unreadable body) is a persistence error.
#[derive(Clone)]
pub struct PostgrestStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl PostgrestStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Adds auth and representation headers.
    fn prepare(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .timeout(self.timeout)
            .header("Prefer", "return=representation");
        match &self.api_key {
            Some(key) => request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn send(&self, operation: &str, table: &str, request: RequestBuilder) -> Result<Response> {
        let response = self.prepare(request).send().await.map_err(|e| {
            tracing::warn!("[PostgrestStore] {} {} failed: {}", operation, table, e);
            ChatError::persistence(format!("{} {} failed: {}", operation, table, e))
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::warn!(
            "[PostgrestStore] {} {} returned {}: {}",
            operation,
            table,
            status,
            body
        );
        Err(ChatError::persistence(format!(
            "{} {} returned {}: {}",
            operation, table, status, body
        )))
    }

    async fn rows(response: Response) -> Result<Vec<Row>> {
        let text = response
            .text()
            .await
            .map_err(|e| ChatError::persistence(format!("Failed to read response: {}", e)))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&text)
            .map_err(|e| ChatError::persistence(format!("Invalid store response: {}", e)))?
        {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(row) => Some(row),
                    _ => None,
                })
                .collect()),
            Value::Object(row) => Ok(vec![row]),
            other => Err(ChatError::persistence(format!(
                "Unexpected store response: {}",
                other
            ))),
        }
    }
}

/// Encodes equality filters as PostgREST query parameters.
fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), format!("eq.{}", scalar(&f.value))))
        .collect()
}

/// Encodes a full select query.
fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(&query.filters));
    if let Some(order) = &query.order {
        let direction = match order.direction {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TableStore for PostgrestStore {
    async fn select(&self, query: Query) -> Result<Vec<Row>> {
        let request = self
            .client
            .get(self.table_url(&query.table))
            .query(&query_params(&query));
        let response = self.send("select", &query.table, request).await?;
        Self::rows(response).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        let request = self.client.post(self.table_url(table)).json(&row);
        let response = self.send("insert", table, request).await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::persistence(format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: &str, filters: Vec<Filter>, patch: Row) -> Result<Vec<Row>> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&filter_params(&filters))
            .json(&patch);
        let response = self.send("update", table, request).await?;
        Self::rows(response).await
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<usize> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&filter_params(&filters));
        let response = self.send("delete", table, request).await?;
        Ok(Self::rows(response).await?.len())
    }
}
