use async_trait::async_trait;
use log::{ error, info };
use std::error::Error as StdError;
use std::sync::Arc;

use crate::error::AnalystError;
use crate::models::query::QueryResult;
use crate::snowflake::SqlApiClient;

/// Anything that can run a SQL statement and hand back rows with column names.
#[async_trait]
pub trait TabularBackend: Send + Sync {
    async fn run(&self, statement: &str) -> Result<QueryResult, Box<dyn StdError + Send + Sync>>;
}

#[async_trait]
impl TabularBackend for SqlApiClient {
    async fn run(&self, statement: &str) -> Result<QueryResult, Box<dyn StdError + Send + Sync>> {
        Ok(self.execute(statement, &[]).await?)
    }
}

#[derive(Clone)]
pub struct SqlExecutor {
    backend: Arc<dyn TabularBackend>,
}

impl SqlExecutor {
    pub fn new(backend: Arc<dyn TabularBackend>) -> Self {
        Self { backend }
    }

    /// One attempt, no retry. Any backend failure becomes `QueryError`.
    pub async fn execute(&self, statement: &str) -> Result<QueryResult, AnalystError> {
        match self.backend.run(statement).await {
            Ok(result) => {
                info!("Query returned {} row(s)", result.row_count());
                Ok(result)
            }
            Err(e) => {
                error!("Query failed: {}", e);
                Err(AnalystError::QueryError {
                    statement: statement.to_string(),
                    cause: e.to_string(),
                })
            }
        }
    }
}
