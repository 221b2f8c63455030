use async_trait::async_trait;
use log::{ error, info, warn };
use reqwest::Client as HttpClient;
use std::error::Error as StdError;
use std::sync::Arc;

use crate::error::AnalystError;
use crate::models::analyst::{ AnalystRequest, AnalystResponse, AnalystResponseBody, ContentItem };
use crate::snowflake::SnowflakeConfig;

pub const ANALYST_ROUTE: &str = "/api/v2/cortex/analyst/message";
pub const REQUEST_ID_HEADER: &str = "x-snowflake-request-id";

#[async_trait]
pub trait AnalystService: Send + Sync {
    /// One request, no retry.
    async fn send(&self, question: &str) -> Result<AnalystResponse, AnalystError>;
}

pub struct CortexAnalystClient {
    http: HttpClient,
    config: Arc<SnowflakeConfig>,
    semantic_model: String,
}

impl CortexAnalystClient {
    pub fn new(
        config: Arc<SnowflakeConfig>,
        semantic_model: impl Into<String>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let http = config.http_client()?;
        Ok(Self {
            http,
            config,
            semantic_model: semantic_model.into(),
        })
    }

    pub fn semantic_model(&self) -> &str {
        &self.semantic_model
    }
}

#[async_trait]
impl AnalystService for CortexAnalystClient {
    async fn send(&self, question: &str) -> Result<AnalystResponse, AnalystError> {
        let req = AnalystRequest::new(question, &self.semantic_model);
        let resp = self.http
            .post(self.config.url(ANALYST_ROUTE))
            .json(&req)
            .send().await
            .map_err(|source| AnalystError::Unreachable { request_id: None, source })?;

        // the id is kept for failures too
        let request_id = resp
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let status = resp.status();
        let body = resp.text().await.map_err(|source| AnalystError::Unreachable {
            request_id: request_id.clone(),
            source,
        })?;

        if !status.is_success() {
            let err = AnalystError::RequestFailed {
                request_id,
                status: status.as_u16(),
                body,
            };
            error!("{}", err);
            return Err(err);
        }

        let response = parse_response(request_id, &body)?;
        info!(
            "Analyst request {} returned {} content item(s)",
            response.request_id,
            response.content.len()
        );
        Ok(response)
    }
}

/// Validates each content item against the closed set of variants.
///
/// The header id wins over the one in the body; "unknown" when neither exists.
pub fn parse_response(
    request_id: Option<String>,
    body: &str
) -> Result<AnalystResponse, AnalystError> {
    let parsed: AnalystResponseBody = serde_json
        ::from_str(body)
        .map_err(|e| AnalystError::MalformedResponse {
            request_id: request_id.clone(),
            detail: format!("invalid response body: {}", e),
        })?;

    let request_id = request_id.or(parsed.request_id).unwrap_or_else(|| "unknown".to_string());
    for warning in &parsed.warnings {
        warn!("Analyst warning (id: {}): {}", request_id, warning.message);
    }

    let mut content = Vec::with_capacity(parsed.message.content.len());
    for (index, raw) in parsed.message.content.into_iter().enumerate() {
        let item: ContentItem = serde_json
            ::from_value(raw)
            .map_err(|e| AnalystError::MalformedResponse {
                request_id: Some(request_id.clone()),
                detail: format!("content item {}: {}", index, e),
            })?;
        if let ContentItem::Suggestions { options } = &item {
            if options.is_empty() {
                return Err(AnalystError::MalformedResponse {
                    request_id: Some(request_id),
                    detail: format!("content item {}: empty suggestion list", index),
                });
            }
        }
        content.push(item);
    }

    Ok(AnalystResponse { request_id, content })
}
