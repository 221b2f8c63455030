use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::info;

const DEFAULT_QUESTION_REWRITE: &str = r#"
Based on the chat history below and the question, generate a query that extend the question
with the chat history provided. The query should be in natural language.

Answer with only the query. Do not add any explanation.

Chat History: {chat_history}
Question : {question}
"#;

const DEFAULT_RESULT_SUMMARY: &str = r#"
You are an expert Data analyst who translated the question contained between <question> and </question> tags
<question>
{question}
</question>

Into the SQL query contained between <SQL> and </SQL> tags
<SQL>
{sql}
</SQL>

And retrieved the below resultset contained between <df> and </df> tags from this SQL Query:
<df>
{results}
</df>

Now share an answer to this question based on SQL query and resultset.
Be concise and use mainly the CONTEXT provided and do not hallucinate.
If you don't have the information just say so.

Whenever possible arrange your response as bullet points.

Do not mention the CONTEXT in your answer

<df>
{results}
</df>
<question>
{question}
</question>
<SQL>
{sql}
</SQL>
Answer:
"#;

#[derive(Debug)]
pub enum PromptError {
    EmptyTemplate(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::EmptyTemplate(key) => write!(f, "Prompt template '{}' is empty", key),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

/// Templates for the two completion calls of a turn. Fields missing from a
/// prompts file fall back to the built-in text.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub question_rewrite: String,
    pub result_summary: String,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            question_rewrite: DEFAULT_QUESTION_REWRITE.to_string(),
            result_summary: DEFAULT_RESULT_SUMMARY.to_string(),
            last_loaded: None,
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if self.question_rewrite.trim().is_empty() {
            return Err(PromptError::EmptyTemplate("question_rewrite".to_string()));
        }
        if self.result_summary.trim().is_empty() {
            return Err(PromptError::EmptyTemplate("result_summary".to_string()));
        }
        Ok(())
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let mut config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    config.last_loaded = Some(SystemTime::now());
    info!("Loaded prompt templates from {}", path.as_ref().display());
    Ok(Arc::new(config))
}

/// Built-in templates unless a prompts file is configured.
pub fn load_prompts_or_default(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(p) if !p.trim().is_empty() => load_prompts(p),
        _ => {
            info!("No prompts file configured, using built-in templates");
            Ok(Arc::new(PromptConfig::default()))
        }
    }
}

pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;

    if let Ok(modified) = metadata.modified() {
        if let Some(last_loaded) = current_config.last_loaded {
            if modified > last_loaded {
                info!("Prompts file changed, reloading...");
                return Ok(Some(load_prompts(path)?));
            }
        } else {
            info!("No last_loaded timestamp, reloading prompts...");
            return Ok(Some(load_prompts(path)?));
        }
    }
    Ok(None)
}

/// Substitutes `{key}` placeholders in one left-to-right pass. Inserted
/// values are never rescanned.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let matched = values
            .iter()
            .find(|(key, _)| tail.starts_with(key) && tail[key.len()..].starts_with('}'));
        match matched {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn get_rewrite_prompt(config: &PromptConfig, chat_history: &str, question: &str) -> String {
    fill_template(
        &config.question_rewrite,
        &[
            ("chat_history", chat_history),
            ("question", question),
        ]
    )
}

pub fn get_summary_prompt(
    config: &PromptConfig,
    question: &str,
    sql: &str,
    results: &str
) -> String {
    fill_template(
        &config.result_summary,
        &[
            ("question", question),
            ("sql", sql),
            ("results", results),
        ]
    )
}
