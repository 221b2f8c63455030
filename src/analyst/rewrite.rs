use log::info;
use std::sync::Arc;

use super::history::format_history_for_prompt;
use crate::config::prompt::{ self, PromptConfig };
use crate::error::AnalystError;
use crate::llm::chat::ChatClient;
use crate::models::chat::Turn;

/// Folds recent history and a follow-up question into one self-contained query.
#[derive(Clone)]
pub struct QueryRewriter {
    client: Arc<dyn ChatClient>,
    debug: bool,
    debug_prompt: bool,
}

impl QueryRewriter {
    pub fn new(client: Arc<dyn ChatClient>, debug: bool, debug_prompt: bool) -> Self {
        Self { client, debug, debug_prompt }
    }

    /// With no history the question passes through untouched and no
    /// completion call is made.
    pub async fn rewrite(
        &self,
        prompts: &PromptConfig,
        history: &[Turn],
        question: &str
    ) -> Result<String, AnalystError> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let rewrite_prompt = prompt::get_rewrite_prompt(
            prompts,
            &format_history_for_prompt(history),
            question
        );
        if self.debug_prompt {
            info!(
                "--- Rewrite Prompt ({}) ---\n{}\n---------------------------",
                self.client.get_model(),
                rewrite_prompt
            );
        }

        let resp = self.client
            .complete(&rewrite_prompt).await
            .map_err(|e| AnalystError::completion(format!("question rewrite: {}", e)))?;
        let rewritten = clean_rewrite(&resp.response);

        if self.debug {
            info!("Rewritten question: '{}'", rewritten);
        }
        if rewritten.is_empty() {
            return Err(AnalystError::completion("question rewrite returned an empty query"));
        }
        Ok(rewritten)
    }
}

/// First non-blank line with quoting characters removed.
fn clean_rewrite(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .replace(['\'', '"', '`'], "")
        .trim()
        .to_string()
}
