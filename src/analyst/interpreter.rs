use log::{ info, warn };

use super::executor::SqlExecutor;
use super::summarizer::Summarizer;
use crate::config::prompt::PromptConfig;
use crate::error::AnalystError;
use crate::models::analyst::{ AnalystResponse, ContentItem };
use crate::models::query::QueryResult;

/// Shown when no item in the response produced an answer.
pub const REFINE_PROMPT: &str = "Please refine that question.";

#[derive(Clone, Debug, PartialEq)]
pub struct Interpretation {
    pub response_text: String,
    pub suggestions: Vec<String>,
    pub sql: Option<String>,
    pub results: Option<QueryResult>,
    pub query_error: Option<String>,
}

impl Default for Interpretation {
    fn default() -> Self {
        Self {
            response_text: REFINE_PROMPT.to_string(),
            suggestions: Vec::new(),
            sql: None,
            results: None,
            query_error: None,
        }
    }
}

/// Walks the content items of one analyst response in order.
#[derive(Clone)]
pub struct ResponseInterpreter {
    executor: SqlExecutor,
    summarizer: Summarizer,
}

impl ResponseInterpreter {
    pub fn new(executor: SqlExecutor, summarizer: Summarizer) -> Self {
        Self { executor, summarizer }
    }

    /// `submitted` is the question sent to the analyst this cycle. It stands in
    /// for the current question when a `Sql` item arrives before any `Text`.
    /// That case deliberately keeps the turn alive: the statement still runs
    /// and is summarized against `submitted`, rather than failing the turn for
    /// lack of an interpreted question.
    pub async fn interpret(
        &self,
        prompts: &PromptConfig,
        response: &AnalystResponse,
        submitted: &str
    ) -> Result<Interpretation, AnalystError> {
        let mut out = Interpretation::default();
        let mut current_question: Option<&str> = None;

        for item in &response.content {
            match item {
                ContentItem::Text { text } => {
                    current_question = Some(text.as_str());
                    out.response_text = text.clone();
                }
                ContentItem::Suggestions { options } => {
                    out.response_text.clear();
                    out.suggestions.extend(options.iter().cloned());
                }
                ContentItem::Sql { statement } => {
                    // no Text yet: fall back instead of aborting the turn
                    let question = current_question.unwrap_or_else(|| {
                        warn!(
                            "SQL item before any text in response {}, summarizing against the submitted question",
                            response.request_id
                        );
                        submitted
                    });
                    out.sql = Some(statement.clone());

                    match self.executor.execute(statement).await {
                        Ok(result) => {
                            let summary = self.summarizer
                                .summarize(prompts, question, &result, statement).await
                                .map_err(|e| e.with_request_id(&response.request_id))?;
                            out.response_text = summary;
                            out.results = Some(result);
                            out.query_error = None;
                        }
                        Err(AnalystError::QueryError { cause, .. }) => {
                            info!("Recording query failure for request {}", response.request_id);
                            out.response_text = format!("Unable to run the generated query: {}", cause);
                            out.results = None;
                            out.query_error = Some(cause);
                        }
                        Err(e) => {
                            return Err(e.with_request_id(&response.request_id));
                        }
                    }
                }
            }
        }

        Ok(out)
    }
}
