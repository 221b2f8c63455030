use serde::{ Serialize, Deserialize };

use super::chat::{ Role, Turn, TurnOutcome };
use super::query::QueryResult;

pub const SUGGESTIONS_NOTICE: &str =
    "This question is not valid. Please try one of the following questions:";

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "suggestion")] Suggestion {
        content: String,
    },
    #[serde(rename = "clear")]
    Clear,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "turn")] Turn {
        role: Role,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        suggestions: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sql: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        results: Option<QueryResult>,
        #[serde(skip_serializing_if = "Option::is_none")]
        query_error: Option<String>,
        timestamp: i64,
    },
    #[serde(rename = "history")] History {
        turns: Vec<Turn>,
    },
    #[serde(rename = "error")] Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    #[serde(rename = "processing")]
    Processing,
}

impl ServerMessage {
    pub fn from_outcome(outcome: TurnOutcome, show_sql: bool) -> Self {
        let notice = if outcome.suggestions.is_empty() {
            None
        } else {
            Some(SUGGESTIONS_NOTICE.to_string())
        };
        let (sql, results) = if show_sql {
            (outcome.sql, outcome.results)
        } else {
            (None, None)
        };

        ServerMessage::Turn {
            role: outcome.turn.role,
            content: outcome.turn.content,
            request_id: outcome.turn.request_id,
            suggestions: outcome.suggestions,
            notice,
            sql,
            results,
            query_error: outcome.query_error,
            timestamp: outcome.turn.timestamp,
        }
    }
}
