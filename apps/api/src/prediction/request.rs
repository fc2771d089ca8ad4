use std::collections::BTreeMap;

use serde_json::Value;

/// Named, pre-serialized context fields for one flow call.
///
/// Lives for a single request. Fields that were never set read as `""`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionRequest {
    fields: BTreeMap<String, String>,
}

impl PredictionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_optional(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.with(name, v),
            None => self,
        }
    }

    /// Stores `value` as pretty JSON. `null` is stored as an empty field.
    pub fn with_json(self, name: &str, value: &Value) -> Self {
        let rendered = match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        };
        self.with(name, rendered)
    }

    pub fn get(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn is_blank(&self, name: &str) -> bool {
        self.get(name).trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_field_reads_empty() {
        let request = PredictionRequest::new().with("constituency", "Gros Islet");
        assert_eq!(request.get("constituency"), "Gros Islet");
        assert_eq!(request.get("news_summary"), "");
        assert!(request.is_blank("news_summary"));
    }

    #[test]
    fn test_with_json_null_is_blank() {
        let request = PredictionRequest::new().with_json("polling_data", &Value::Null);
        assert!(request.is_blank("polling_data"));
    }

    #[test]
    fn test_with_json_keeps_strings_verbatim() {
        let request = PredictionRequest::new().with_json("candidates", &json!("already text"));
        assert_eq!(request.get("candidates"), "already text");
    }

    #[test]
    fn test_with_json_serializes_structures() {
        let request =
            PredictionRequest::new().with_json("historical_results", &json!([{"year": 2021}]));
        let parsed: Value = serde_json::from_str(request.get("historical_results")).unwrap();
        assert_eq!(parsed[0]["year"], 2021);
    }

    #[test]
    fn test_with_optional_skips_none() {
        let request = PredictionRequest::new()
            .with_optional("headline", None::<String>)
            .with_optional("constituency", Some("Castries North"));
        assert!(request.is_blank("headline"));
        assert_eq!(request.get("constituency"), "Castries North");
    }
}
