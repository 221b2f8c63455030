pub mod agent;
pub mod analyst;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod server;
pub mod snowflake;

use agent::AnalystAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Snowflake Account: {}", args.account);
    info!("Semantic Model: @{}/{}", args.semantic_stage, args.semantic_model_file);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Use Chat History: {}", args.use_chat_history);
    info!("Slide Window: {}", args.slide_window);
    info!("Show SQL: {}", args.show_sql);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("(built-in)"));
    info!("-------------------------");

    let agent = Arc::new(Mutex::new(AnalystAgent::from_args(&args)?));
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
