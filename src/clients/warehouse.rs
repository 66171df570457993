//! Warehouse client: parameterized SQL in, rows of named values out.
//!
//! The production implementation talks to the BigQuery `jobs.query` REST
//! endpoint with named parameters. [`DryRunWarehouse`] logs the query and
//! returns no rows so a plan can run with no network.

use crate::error::WarehouseError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// A typed scalar bound to a named placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int64(i64),
    String(String),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Int64(_) => "INT64",
            ParamValue::String(_) => "STRING",
        }
    }

    /// BigQuery transmits every scalar parameter value as a string.
    fn wire_value(&self) -> String {
        match self {
            ParamValue::Int64(v) => v.to_string(),
            ParamValue::String(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub name: String,
    pub value: ParamValue,
}

impl QueryParam {
    pub fn int64(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            value: ParamValue::Int64(value),
        }
    }

    pub fn string(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: ParamValue::String(value.to_string()),
        }
    }
}

/// SQL text with `@name` placeholders and the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

#[cfg(test)]
impl WarehouseQuery {
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

/// One result row. Values are nullable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by clients and tests.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.columns.push((name.to_string(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .filter(|v| !v.is_null())
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }
}

#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Run a query to completion and return every row.
    async fn query(&self, query: &WarehouseQuery) -> Result<Vec<Row>, WarehouseError>;
}

/// BigQuery REST client (`POST {base}/projects/{project}/queries`).
pub struct BigQueryClient {
    http: reqwest::Client,
    base_url: String,
    project: String,
    location: Option<String>,
    access_token: Option<String>,
    timeout_seconds: u64,
}

impl BigQueryClient {
    pub fn new(
        base_url: &str,
        project: &str,
        location: Option<String>,
        access_token: Option<String>,
        timeout_seconds: u64,
    ) -> Result<Self, WarehouseError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| WarehouseError::Transport {
                url: base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            location,
            access_token,
            timeout_seconds,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/projects/{}/queries", self.base_url, self.project)
    }

    /// Request body for `jobs.query` with named parameters.
    fn request_body(&self, query: &WarehouseQuery) -> Value {
        let params: Vec<Value> = query
            .params
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "parameterType": { "type": p.value.type_name() },
                    "parameterValue": { "value": p.value.wire_value() },
                })
            })
            .collect();

        let mut body = json!({
            "query": query.sql,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": params,
            "timeoutMs": self.timeout_seconds * 1000,
        });
        if let Some(ref location) = self.location {
            body["location"] = Value::String(location.clone());
        }
        body
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: Option<bool>,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<WireRow>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<SchemaField>,
}

#[derive(Debug, Deserialize)]
struct SchemaField {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Deserialize)]
struct WireRow {
    f: Vec<WireCell>,
}

#[derive(Debug, Deserialize)]
struct WireCell {
    v: Value,
}

/// Numeric columns arrive as strings; convert them using the schema.
fn decode_cell(field_type: &str, raw: Value) -> Value {
    match (field_type, raw) {
        ("INTEGER" | "INT64", Value::String(s)) => s
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(s)),
        ("FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC", Value::String(s)) => s
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or(Value::String(s)),
        (_, other) => other,
    }
}

fn decode_rows(response: QueryResponse) -> Result<Vec<Row>, WarehouseError> {
    if response.job_complete == Some(false) {
        return Err(WarehouseError::Incomplete(
            "job still running when the request timeout elapsed".to_string(),
        ));
    }

    let fields = response.schema.map(|s| s.fields).unwrap_or_default();
    let mut rows = Vec::with_capacity(response.rows.len());

    for wire in response.rows {
        if wire.f.len() != fields.len() {
            return Err(WarehouseError::Decode(format!(
                "row has {} cells but schema has {} fields",
                wire.f.len(),
                fields.len()
            )));
        }
        let mut row = Row::new();
        for (field, cell) in fields.iter().zip(wire.f) {
            row = row.with(&field.name, decode_cell(&field.field_type, cell.v));
        }
        rows.push(row);
    }

    Ok(rows)
}

#[async_trait]
impl WarehouseClient for BigQueryClient {
    async fn query(&self, query: &WarehouseQuery) -> Result<Vec<Row>, WarehouseError> {
        let url = self.endpoint();
        debug!("Submitting query to {} with {} params", url, query.params.len());

        let mut request = self.http.post(&url).json(&self.request_body(query));
        if let Some(ref token) = self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                WarehouseError::Timeout(self.timeout_seconds)
            } else {
                WarehouseError::Transport {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(WarehouseError::Status { status, body });
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| WarehouseError::Decode(e.to_string()))?;

        let rows = decode_rows(parsed)?;
        debug!("Warehouse returned {} rows", rows.len());
        Ok(rows)
    }
}

/// Logs each query and returns no rows.
#[derive(Debug, Default)]
pub struct DryRunWarehouse;

#[async_trait]
impl WarehouseClient for DryRunWarehouse {
    async fn query(&self, query: &WarehouseQuery) -> Result<Vec<Row>, WarehouseError> {
        info!("[dry-run] warehouse query with {} params", query.params.len());
        debug!("[dry-run] SQL:\n{}", query.sql);
        Ok(Vec::new())
    }
}
