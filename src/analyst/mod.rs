pub mod client;
pub mod executor;
pub mod history;
pub mod interpreter;
pub mod rewrite;
pub mod summarizer;

pub use client::{ AnalystService, CortexAnalystClient };
pub use executor::{ SqlExecutor, TabularBackend };
pub use interpreter::{ Interpretation, ResponseInterpreter };
pub use rewrite::QueryRewriter;
pub use summarizer::Summarizer;
