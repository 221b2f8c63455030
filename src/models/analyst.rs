use serde::{ Deserialize, Serialize };

/// One item of an analyst message. Requests only ever carry `Text`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Suggestions {
        #[serde(rename = "suggestions")]
        options: Vec<String>,
    },
    Sql {
        statement: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalystMessage {
    pub role: String,
    pub content: Vec<ContentItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalystRequest {
    pub messages: Vec<AnalystMessage>,
    pub semantic_model_file: String,
}

impl AnalystRequest {
    pub fn new(question: &str, semantic_model_ref: &str) -> Self {
        Self {
            messages: vec![AnalystMessage {
                role: "user".to_string(),
                content: vec![ContentItem::Text { text: question.to_string() }],
            }],
            semantic_model_file: semantic_model_ref.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalystResponse {
    pub request_id: String,
    pub content: Vec<ContentItem>,
}

/// Raw body shape; items stay untyped until validated one by one.
#[derive(Debug, Deserialize)]
pub struct AnalystResponseBody {
    pub message: RawAnalystMessage,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub warnings: Vec<AnalystWarning>,
}

#[derive(Debug, Deserialize)]
pub struct RawAnalystMessage {
    #[serde(default)]
    pub role: Option<String>,
    pub content: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct AnalystWarning {
    pub message: String,
}

pub fn semantic_model_ref(stage: &str, file: &str) -> String {
    format!("@{}/{}", stage.trim_start_matches('@'), file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_matches_wire_shape() {
        let req = AnalystRequest::new("What is total traffic by tower?", "@DATA/semantic_model.yaml");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "messages": [{
                    "role": "user",
                    "content": [{ "type": "text", "text": "What is total traffic by tower?" }]
                }],
                "semantic_model_file": "@DATA/semantic_model.yaml"
            })
        );
    }

    #[test]
    fn content_items_deserialize_by_type_tag() {
        let items: Vec<ContentItem> = serde_json::from_value(
            json!([
                { "type": "text", "text": "This is our interpretation" },
                { "type": "suggestions", "suggestions": ["A", "B"] },
                { "type": "sql", "statement": "SELECT 1", "confidence": { "verified_query_used": null } }
            ])
        ).unwrap();

        assert_eq!(items[0], ContentItem::Text { text: "This is our interpretation".into() });
        assert_eq!(items[1], ContentItem::Suggestions { options: vec!["A".into(), "B".into()] });
        assert_eq!(items[2], ContentItem::Sql { statement: "SELECT 1".into() });
    }

    #[test]
    fn unknown_item_type_is_rejected() {
        let item = serde_json::from_value::<ContentItem>(json!({ "type": "chart", "spec": {} }));
        assert!(item.is_err());
    }

    #[test]
    fn semantic_model_ref_is_stage_prefixed() {
        assert_eq!(semantic_model_ref("DATA", "semantic_model.yaml"), "@DATA/semantic_model.yaml");
        assert_eq!(semantic_model_ref("@DATA", "m.yaml"), "@DATA/m.yaml");
    }
}
