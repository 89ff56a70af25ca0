//! [`DataStore`] over the hosted REST tables API (`/rest/v1`).

use async_trait::async_trait;
use marketplace::{DataStore, Filter, Query, StoreError, Table};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::client::RestClient;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse};

const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Clone)]
pub struct RestDataStore {
    client: RestClient,
}

impl std::fmt::Debug for RestDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDataStore").finish_non_exhaustive()
    }
}

fn table_path(table: Table) -> String {
    format!("/rest/v1/{table}")
}

fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_query_pair).collect()
}

fn decode_error(table: &str, err: serde_json::Error) -> StoreError {
    StoreError::Decode {
        table: table.to_owned(),
        message: err.to_string(),
    }
}

/// Parses a JSON array of rows.
fn rows(table: &str, response: &HttpResponse) -> Result<Vec<Value>, StoreError> {
    if response.body.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&response.body).map_err(|err| decode_error(table, err))
}

/// Parses one row; single-row responses may come back wrapped in an array.
fn single_row(table: &str, response: &HttpResponse) -> Result<Value, StoreError> {
    let value: Value =
        serde_json::from_slice(&response.body).map_err(|err| decode_error(table, err))?;
    match value {
        Value::Array(mut items) if !items.is_empty() => Ok(items.swap_remove(0)),
        Value::Array(_) | Value::Null => Err(StoreError::NotFound {
            message: format!("'{table}' returned no row"),
        }),
        other => Ok(other),
    }
}

/// Reads the total from a `Content-Range` header such as `0-24/57` or `*/0`.
fn parse_content_range(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

fn require_filters(filters: &[Filter], operation: &str, table: Table) -> Result<(), StoreError> {
    if filters.is_empty() {
        Err(StoreError::unavailable(format!(
            "refusing to {operation} every row of '{table}'"
        )))
    } else {
        Ok(())
    }
}

impl RestDataStore {
    pub(crate) fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataStore for RestDataStore {
    #[instrument(skip(self, query), fields(%table))]
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
        let request = self.client.authorize(
            HttpRequest::new(HttpMethod::Get, table_path(table))
                .query("select", "*")
                .query_pairs(query.to_query_pairs()),
        );
        let response = self
            .client
            .send_idempotent(request, &format!("select from {table}"))
            .await?;
        let rows = rows(table.as_str(), &response)?;
        debug!(count = rows.len(), "Selected rows");
        Ok(rows)
    }

    #[instrument(skip(self, row), fields(%table))]
    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        let request = self.client.authorize(
            HttpRequest::new(HttpMethod::Post, table_path(table))
                .header("Prefer", RETURN_REPRESENTATION)
                .json(row),
        );
        let response = self
            .client
            .send(request)
            .await
            .map_err(|failure| failure.into_store_error(&format!("insert into {table}")))?;
        single_row(table.as_str(), &response)
    }

    #[instrument(skip(self, filters, patch), fields(%table))]
    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        require_filters(filters, "update", table)?;
        let request = self.client.authorize(
            HttpRequest::new(HttpMethod::Patch, table_path(table))
                .query_pairs(filter_pairs(filters))
                .header("Prefer", RETURN_REPRESENTATION)
                .json(patch),
        );
        let response = self
            .client
            .send(request)
            .await
            .map_err(|failure| failure.into_store_error(&format!("update {table}")))?;
        rows(table.as_str(), &response)
    }

    #[instrument(skip(self, filters), fields(%table))]
    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError> {
        require_filters(filters, "delete", table)?;
        let request = self.client.authorize(
            HttpRequest::new(HttpMethod::Delete, table_path(table))
                .query_pairs(filter_pairs(filters))
                .header("Prefer", RETURN_REPRESENTATION),
        );
        let response = self
            .client
            .send(request)
            .await
            .map_err(|failure| failure.into_store_error(&format!("delete from {table}")))?;
        Ok(rows(table.as_str(), &response)?.len() as u64)
    }

    #[instrument(skip(self, filters), fields(%table))]
    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError> {
        let request = self.client.authorize(
            HttpRequest::new(HttpMethod::Head, table_path(table))
                .query("select", "id")
                .query_pairs(filter_pairs(filters))
                .header("Prefer", "count=exact"),
        );
        let response = self
            .client
            .send_idempotent(request, &format!("count {table}"))
            .await?;
        response
            .header("Content-Range")
            .and_then(parse_content_range)
            .ok_or_else(|| StoreError::Decode {
                table: table.to_string(),
                message: "count response carried no usable Content-Range header".into(),
            })
    }

    #[instrument(skip(self, args))]
    async fn rpc(&self, name: &str, args: Value) -> Result<Value, StoreError> {
        let request = self.client.authorize(
            HttpRequest::new(HttpMethod::Post, format!("/rest/v1/rpc/{name}")).json(args),
        );
        let response = self
            .client
            .send(request)
            .await
            .map_err(|failure| failure.into_store_error(&format!("call {name}")))?;
        single_row(name, &response)
    }
}
