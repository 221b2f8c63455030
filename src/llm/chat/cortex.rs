use async_trait::async_trait;
use serde_json::Value;
use std::error::Error as StdError;

use super::{ ChatClient, CompletionResponse };
use crate::llm::{ LlmConfig, LlmType };
use crate::snowflake::SqlApiClient;

const COMPLETE_STATEMENT: &str = "select snowflake.cortex.complete(?, ?) as response";

/// Runs `SNOWFLAKE.CORTEX.COMPLETE` as a bound SQL statement.
pub struct CortexCompleteClient {
    sql_api: SqlApiClient,
    model: String,
}

impl CortexCompleteClient {
    pub fn new(sql_api: SqlApiClient, model: Option<String>) -> Self {
        Self {
            sql_api,
            model: model.unwrap_or_else(|| "llama3.1-70b".to_string()),
        }
    }

    pub fn from_config(
        config: &LlmConfig,
        sql_api: SqlApiClient
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        if config.llm_type != LlmType::Cortex {
            return Err("Invalid config type for CortexCompleteClient".into());
        }
        Ok(Self::new(sql_api, config.completion_model.clone()))
    }
}

#[async_trait]
impl ChatClient for CortexCompleteClient {
    async fn complete(
        &self,
        prompt: &str
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        let result = self.sql_api.execute(COMPLETE_STATEMENT, &[self.model.as_str(), prompt]).await?;
        let response = match result.scalar() {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => {
                return Err("Cortex COMPLETE returned no response".into());
            }
            Some(other) => other.to_string(),
        };
        Ok(CompletionResponse { response })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
