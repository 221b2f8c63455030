//! Failures of one processing cycle.

/// Every variant that can originate after the analyst call carries the
/// request id, so support can correlate it with the service logs.
#[derive(Debug, thiserror::Error)]
pub enum AnalystError {
    #[error("Failed request (id: {}) with status {status}: {body}", display_id(.request_id))]
    RequestFailed {
        request_id: Option<String>,
        status: u16,
        body: String,
    },
    #[error("Analyst service unreachable (id: {}): {source}", display_id(.request_id))]
    Unreachable {
        request_id: Option<String>,
        #[source]
        source: reqwest::Error,
    },
    #[error("Query failed: {cause} (statement: {statement})")]
    QueryError {
        statement: String,
        cause: String,
    },
    #[error("Completion failed (id: {}): {message}", display_id(.request_id))]
    CompletionFailed {
        request_id: Option<String>,
        message: String,
    },
    #[error("Malformed analyst response (id: {}): {detail}", display_id(.request_id))]
    MalformedResponse {
        request_id: Option<String>,
        detail: String,
    },
}

impl AnalystError {
    pub fn completion(message: impl Into<String>) -> Self {
        AnalystError::CompletionFailed {
            request_id: None,
            message: message.into(),
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            | AnalystError::RequestFailed { request_id, .. }
            | AnalystError::Unreachable { request_id, .. }
            | AnalystError::CompletionFailed { request_id, .. }
            | AnalystError::MalformedResponse { request_id, .. } => request_id.as_deref(),
            AnalystError::QueryError { .. } => None,
        }
    }

    /// Attaches the analyst request id to errors raised later in the same cycle.
    pub fn with_request_id(self, id: &str) -> Self {
        match self {
            AnalystError::CompletionFailed { request_id: None, message } =>
                AnalystError::CompletionFailed {
                    request_id: Some(id.to_string()),
                    message,
                },
            AnalystError::MalformedResponse { request_id: None, detail } =>
                AnalystError::MalformedResponse {
                    request_id: Some(id.to_string()),
                    detail,
                },
            other => other,
        }
    }
}

fn display_id(request_id: &Option<String>) -> &str {
    request_id.as_deref().unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_message_keeps_id_and_status() {
        let err = AnalystError::RequestFailed {
            request_id: Some("abc-123".into()),
            status: 400,
            body: "prompt too long".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed request (id: abc-123) with status 400: prompt too long"
        );
        assert_eq!(err.request_id(), Some("abc-123"));
    }

    #[test]
    fn missing_id_displays_unknown() {
        let err = AnalystError::completion("model overloaded");
        assert_eq!(err.to_string(), "Completion failed (id: unknown): model overloaded");
        assert_eq!(err.request_id(), None);
    }

    #[test]
    fn with_request_id_fills_only_empty_ids() {
        let err = AnalystError::completion("boom").with_request_id("r-1");
        assert_eq!(err.request_id(), Some("r-1"));

        let err = AnalystError::CompletionFailed {
            request_id: Some("r-0".into()),
            message: "boom".into(),
        }.with_request_id("r-1");
        assert_eq!(err.request_id(), Some("r-0"));

        let err = AnalystError::QueryError {
            statement: "SELECT 1".into(),
            cause: "no warehouse".into(),
        }.with_request_id("r-1");
        assert_eq!(err.request_id(), None);
    }
}
