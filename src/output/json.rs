use super::{Formatter, ScenarioSummary};

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, summary: &ScenarioSummary) -> String {
        // a summary holds only strings, numbers and options
        serde_json::to_string(summary).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
    }
}
