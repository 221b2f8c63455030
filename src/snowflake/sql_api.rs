use log::{ debug, info };
use reqwest::{ Client as HttpClient, StatusCode };
use serde::{ Deserialize, Serialize };
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use super::SnowflakeConfig;
use crate::models::query::QueryResult;

const STATEMENTS_ROUTE: &str = "/api/v2/statements";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum SqlApiError {
    #[error("SQL API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("SQL API returned status {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },
    #[error("Unexpected SQL API response: {0}")]
    Decode(String),
}

#[derive(Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, Binding<'a>>,
}

#[derive(Serialize)]
struct Binding<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<RowType>,
    #[serde(default)]
    partition_info: Vec<Value>,
}

#[derive(Deserialize, Debug)]
struct RowType {
    name: String,
}

/// Runs statements through the Snowflake SQL REST API and collects every
/// result partition into one `QueryResult`.
#[derive(Clone)]
pub struct SqlApiClient {
    http: HttpClient,
    config: Arc<SnowflakeConfig>,
}

impl SqlApiClient {
    pub fn new(config: Arc<SnowflakeConfig>) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let http = config.http_client()?;
        Ok(Self { http, config })
    }

    /// `bindings` are positional text values for `?` placeholders.
    pub async fn execute(
        &self,
        statement: &str,
        bindings: &[&str]
    ) -> Result<QueryResult, SqlApiError> {
        let req = StatementRequest {
            statement,
            timeout: self.config.timeout_secs,
            database: self.config.database.as_deref(),
            schema: self.config.schema.as_deref(),
            warehouse: self.config.warehouse.as_deref(),
            role: self.config.role.as_deref(),
            bindings: bindings
                .iter()
                .enumerate()
                .map(|(i, value)| ((i + 1).to_string(), Binding { kind: "TEXT", value: *value }))
                .collect(),
        };

        let resp = self.http.post(self.config.url(STATEMENTS_ROUTE)).json(&req).send().await?;
        let mut body = Self::read_statement(resp).await?;

        while body.0 == StatusCode::ACCEPTED {
            let handle = body.1.statement_handle
                .clone()
                .ok_or_else(|| SqlApiError::Decode("202 response without statementHandle".into()))?;
            debug!("Statement {} still running, polling", handle);
            tokio::time::sleep(POLL_INTERVAL).await;
            body = self.fetch(&handle, None).await?;
        }

        let first = body.1;
        let partitions = first.result_set_meta_data
            .as_ref()
            .map(|m| m.partition_info.len())
            .unwrap_or(0);
        let handle = first.statement_handle.clone();
        let columns = first.result_set_meta_data
            .as_ref()
            .map(|m| m.row_type.iter().map(|c| c.name.clone()).collect::<Vec<_>>())
            .unwrap_or_default();
        let mut rows = first.data;

        if partitions > 1 {
            let handle = handle.ok_or_else(||
                SqlApiError::Decode("partitioned result without statementHandle".into())
            )?;
            for partition in 1..partitions {
                let (_, next) = self.fetch(&handle, Some(partition)).await?;
                rows.extend(next.data);
            }
        }

        info!("Statement returned {} row(s) across {} partition(s)", rows.len(), partitions.max(1));
        Ok(QueryResult::new(columns, rows))
    }

    async fn fetch(
        &self,
        handle: &str,
        partition: Option<usize>
    ) -> Result<(StatusCode, StatementResponse), SqlApiError> {
        let url = self.config.url(&format!("{}/{}", STATEMENTS_ROUTE, handle));
        let mut req = self.http.get(url);
        if let Some(p) = partition {
            req = req.query(&[("partition", p)]);
        }
        Self::read_statement(req.send().await?).await
    }

    async fn read_statement(
        resp: reqwest::Response
    ) -> Result<(StatusCode, StatementResponse), SqlApiError> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let message = serde_json
                ::from_str::<StatementResponse>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(text);
            return Err(SqlApiError::Status { status: status.as_u16(), message });
        }

        let body = serde_json
            ::from_str::<StatementResponse>(&text)
            .map_err(|e| SqlApiError::Decode(e.to_string()))?;
        Ok((status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_numbers_bindings_from_one() {
        let mut bindings = BTreeMap::new();
        bindings.insert("1".to_string(), Binding { kind: "TEXT", value: "llama3.1-70b" });
        bindings.insert("2".to_string(), Binding { kind: "TEXT", value: "prompt" });
        let req = StatementRequest {
            statement: "select 1",
            timeout: 60,
            database: Some("DB"),
            schema: None,
            warehouse: None,
            role: None,
            bindings,
        };

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["bindings"]["1"], json!({ "type": "TEXT", "value": "llama3.1-70b" }));
        assert_eq!(value["database"], "DB");
        assert!(value.get("schema").is_none());
    }

    #[test]
    fn response_reads_columns_and_partitions() {
        let body: StatementResponse = serde_json::from_value(
            json!({
                "statementHandle": "01b2",
                "resultSetMetaData": {
                    "numRows": 3,
                    "rowType": [{ "name": "TOWER", "type": "text" }, { "name": "TRAFFIC", "type": "fixed" }],
                    "partitionInfo": [{ "rowCount": 2 }, { "rowCount": 1 }]
                },
                "data": [["T1", "10"], ["T2", null]]
            })
        ).unwrap();

        let meta = body.result_set_meta_data.unwrap();
        assert_eq!(meta.row_type.len(), 2);
        assert_eq!(meta.partition_info.len(), 2);
        assert_eq!(body.data[1][1], Value::Null);
    }
}
