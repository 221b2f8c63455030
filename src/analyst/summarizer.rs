use log::info;
use std::sync::Arc;

use crate::config::prompt::{ self, PromptConfig };
use crate::error::AnalystError;
use crate::llm::chat::ChatClient;
use crate::models::query::QueryResult;

/// Second completion round-trip: answers the question from the result set.
#[derive(Clone)]
pub struct Summarizer {
    client: Arc<dyn ChatClient>,
    debug_prompt: bool,
}

impl Summarizer {
    pub fn new(client: Arc<dyn ChatClient>, debug_prompt: bool) -> Self {
        Self { client, debug_prompt }
    }

    pub async fn summarize(
        &self,
        prompts: &PromptConfig,
        question: &str,
        result: &QueryResult,
        statement: &str
    ) -> Result<String, AnalystError> {
        let summary_prompt = prompt::get_summary_prompt(
            prompts,
            question,
            statement,
            &result.to_prompt_table()
        );
        if self.debug_prompt {
            info!(
                "--- Summary Prompt ({}) ---\n{}\n---------------------------",
                self.client.get_model(),
                summary_prompt
            );
        }

        let resp = self.client
            .complete(&summary_prompt).await
            .map_err(|e| AnalystError::completion(format!("result summary: {}", e)))?;
        Ok(resp.response)
    }
}
