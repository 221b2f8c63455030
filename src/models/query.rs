use serde::{ Deserialize, Serialize };
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First cell of the first row, for single-value statements.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Pipe table embedding every row, used inside completion prompts.
    pub fn to_prompt_table(&self) -> String {
        if self.columns.is_empty() && self.rows.is_empty() {
            return "(no rows)".to_string();
        }

        let mut out = String::new();
        out.push_str(&format!("| {} |\n", self.columns.join(" | ")));
        out.push_str(
            &format!("|{}|\n", self.columns.iter().map(|_| " --- ").collect::<Vec<_>>().join("|"))
        );
        for row in &self.rows {
            let cells = row.iter().map(cell_text).collect::<Vec<_>>();
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        if self.rows.is_empty() {
            out.push_str("(no rows)\n");
        }
        out
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
