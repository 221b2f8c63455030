use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Snowflake Connection Args ---
    /// Snowflake account identifier (e.g., myorg-myaccount)
    #[arg(long, env = "SNOWFLAKE_ACCOUNT", default_value = "")]
    pub account: String,

    /// Full host override (e.g., https://myorg-myaccount.snowflakecomputing.com). Derived from the account if not set.
    #[arg(long, env = "SNOWFLAKE_HOST")]
    pub snowflake_host: Option<String>,

    /// Token used for both the analyst and SQL REST APIs
    #[arg(long, env = "SNOWFLAKE_TOKEN", default_value = "")]
    pub token: String,

    /// Token type (OAUTH, KEYPAIR_JWT, PROGRAMMATIC_ACCESS_TOKEN, SESSION)
    #[arg(long, env = "SNOWFLAKE_TOKEN_TYPE", default_value = "OAUTH")]
    pub token_type: String,

    /// Default database for executed statements
    #[arg(long, env = "SNOWFLAKE_DATABASE")]
    pub database: Option<String>,

    /// Default schema for executed statements
    #[arg(long, env = "SNOWFLAKE_SCHEMA")]
    pub schema: Option<String>,

    /// Warehouse used to run generated SQL
    #[arg(long, env = "SNOWFLAKE_WAREHOUSE")]
    pub warehouse: Option<String>,

    /// Role used to run generated SQL
    #[arg(long, env = "SNOWFLAKE_ROLE")]
    pub role: Option<String>,

    /// Server-side timeout in seconds for SQL statements (0 = account default)
    #[arg(long, env = "SQL_TIMEOUT_SECS", default_value = "60")]
    pub sql_timeout_secs: u64,

    // --- Semantic Model Args ---
    /// Stage holding the semantic model file
    #[arg(long, env = "SEMANTIC_STAGE", default_value = "DATA")]
    pub semantic_stage: String,

    /// Semantic model file name within the stage
    #[arg(long, env = "SEMANTIC_MODEL_FILE", default_value = "semantic_model.yaml")]
    pub semantic_model_file: String,

    // --- Completion LLM Provider Args ---
    /// Type of LLM provider for rewrite and summary completions (cortex, openai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "cortex")]
    pub chat_llm_type: String,

    /// Model name for completions (e.g., llama3.1-70b for Cortex, gpt-4o for OpenAI)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Base URL for the completion provider API (ignored for cortex)
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: Option<String>,

    /// API Key for the completion provider (ignored for cortex)
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    // --- Conversation Args ---
    /// Fold recent chat history into each question before sending it to the analyst
    #[arg(long, env = "USE_CHAT_HISTORY", default_value = "false")]
    pub use_chat_history: bool,

    /// Number of most recent turns considered as history
    #[arg(long, env = "SLIDE_WINDOW", default_value = "2")]
    pub slide_window: usize,

    /// Include generated SQL and result sets in responses sent to clients
    #[arg(long, env = "SHOW_SQL", default_value = "true", action = clap::ArgAction::Set)]
    pub show_sql: bool,

    /// Path to an optional prompt template file. Built-in templates are used if not set.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    // --- Debug Args ---
    /// Log the rewritten question of each turn
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Log full prompts sent to the completion model
    #[arg(long, env = "DEBUG_PROMPT", default_value = "false")]
    pub debug_prompt: bool,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional secret for HMAC-signed WebSocket handshakes. If set, clients must provide ts and sig.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Optional port for the HTTP admin API (health, prompt reload).
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS. Requires --tls-key.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS. Requires --tls-cert.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
