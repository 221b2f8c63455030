use crate::analyst::history;
use crate::analyst::{
    AnalystService,
    CortexAnalystClient,
    QueryRewriter,
    ResponseInterpreter,
    SqlExecutor,
    Summarizer,
    TabularBackend,
};
use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::error::AnalystError;
use crate::llm::{ LlmConfig, LlmType };
use crate::llm::chat::{ ChatClient, new_client as new_chat_client };
use crate::models::analyst::semantic_model_ref;
use crate::models::chat::{ ConversationContext, Turn, TurnOutcome };
use crate::snowflake::{ SnowflakeConfig, SqlApiClient };

use log::{ info, warn, error };
use std::error::Error;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub use_chat_history: bool,
    pub slide_window: usize,
    pub debug: bool,
    pub debug_prompt: bool,
}

impl AgentSettings {
    pub fn from_args(args: &Args) -> Self {
        Self {
            use_chat_history: args.use_chat_history,
            slide_window: args.slide_window,
            debug: args.debug,
            debug_prompt: args.debug_prompt,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            use_chat_history: false,
            slide_window: 2,
            debug: false,
            debug_prompt: false,
        }
    }
}

/// Runs processing cycles against a caller-owned `ConversationContext`.
///
/// A cycle appends the user turn, then exactly one assistant turn on success
/// and nothing more on failure.
pub struct AnalystAgent {
    analyst: Arc<dyn AnalystService>,
    rewriter: QueryRewriter,
    interpreter: ResponseInterpreter,
    prompt_config: Arc<PromptConfig>,
    settings: AgentSettings,
}

impl AnalystAgent {
    pub fn new(
        analyst: Arc<dyn AnalystService>,
        completion: Arc<dyn ChatClient>,
        backend: Arc<dyn TabularBackend>,
        prompt_config: Arc<PromptConfig>,
        settings: AgentSettings
    ) -> Self {
        let rewriter = QueryRewriter::new(
            Arc::clone(&completion),
            settings.debug,
            settings.debug_prompt
        );
        let interpreter = ResponseInterpreter::new(
            SqlExecutor::new(backend),
            Summarizer::new(completion, settings.debug_prompt)
        );

        Self {
            analyst,
            rewriter,
            interpreter,
            prompt_config,
            settings,
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let snowflake = Arc::new(SnowflakeConfig::from_args(args)?);
        let sql_api = SqlApiClient::new(Arc::clone(&snowflake))?;

        let model_ref = semantic_model_ref(&args.semantic_stage, &args.semantic_model_file);
        let analyst = CortexAnalystClient::new(Arc::clone(&snowflake), model_ref)?;
        info!(
            "Analyst client configured: Host={}, SemanticModel={}",
            snowflake.base_url,
            analyst.semantic_model()
        );

        let chat_llm_type: LlmType = args.chat_llm_type.parse()?;
        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: chat_llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
        };
        let completion = new_chat_client(&chat_config, &sql_api)?;
        info!(
            "Completion client configured: Type={}, Model={}",
            args.chat_llm_type,
            completion.get_model()
        );

        let prompt_config = prompt::load_prompts_or_default(args.prompts_path.as_deref())?;

        Ok(
            Self::new(
                Arc::new(analyst),
                completion,
                Arc::new(sql_api),
                prompt_config,
                AgentSettings::from_args(args)
            )
        )
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Typed input. Recent history may fold into the question first; a
    /// failed rewrite degrades to the raw question.
    pub async fn process_message(
        &self,
        ctx: &mut ConversationContext,
        question: &str
    ) -> Result<TurnOutcome, AnalystError> {
        ctx.append(Turn::user(question));

        let history = history::chat_history(
            ctx.turns(),
            self.settings.slide_window,
            self.settings.use_chat_history
        );
        let submitted = match self.rewriter.rewrite(&self.prompt_config, history, question).await {
            Ok(rewritten) => rewritten,
            Err(e) => {
                warn!("Question rewrite failed for conversation {}, using raw question: {}", ctx.id(), e);
                question.to_string()
            }
        };

        self.dispatch(ctx, &submitted).await
    }

    /// Replays the selected suggestion, if any, as the next user question.
    /// The slot is emptied before the cycle runs, so a failed replay is not
    /// retried. Replays go to the analyst without history or rewrite.
    pub async fn replay_suggestion(
        &self,
        ctx: &mut ConversationContext
    ) -> Option<Result<TurnOutcome, AnalystError>> {
        let suggestion = ctx.suggestions_mut().take()?;
        info!("Replaying suggestion for conversation {}: '{}'", ctx.id(), suggestion);

        ctx.append(Turn::user(suggestion.clone()));
        Some(self.dispatch(ctx, &suggestion).await)
    }

    pub fn clear(&self, ctx: &mut ConversationContext) {
        ctx.clear();
        info!("Conversation {} cleared", ctx.id());
    }

    async fn dispatch(
        &self,
        ctx: &mut ConversationContext,
        submitted: &str
    ) -> Result<TurnOutcome, AnalystError> {
        let response = self.analyst.send(submitted).await?;
        let interpretation = self.interpreter
            .interpret(&self.prompt_config, &response, submitted).await
            .map_err(|e| {
                error!("Turn failed for request {}: {}", response.request_id, e);
                e
            })?;

        ctx.suggestions_mut().offer(interpretation.suggestions.clone());
        let turn = Turn::assistant(interpretation.response_text, Some(response.request_id));
        ctx.append(turn.clone());

        Ok(TurnOutcome {
            turn,
            suggestions: interpretation.suggestions,
            sql: interpretation.sql,
            results: interpretation.results,
            query_error: interpretation.query_error,
        })
    }

    /// Swaps in a changed prompts file. Never called while a cycle holds the agent.
    pub async fn reload_prompts_if_changed(
        &mut self,
        args: &Args
    ) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let prompts_path = match args.prompts_path.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => {
                return Ok(false);
            }
        };

        let result = prompt::reload_prompts_if_changed(prompts_path, &self.prompt_config)?;
        if let Some(new_config) = result {
            self.prompt_config = new_config;
            info!("Prompts successfully reloaded");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
