//! Per-agent configuration (`config.json`).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use strandex_core::PromptTemplates;

/// Agent configuration document.
///
/// Loading never fails: a missing or malformed file, or a field of the
/// wrong shape, falls back to the empty default for that part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tool names, in configured order, without duplicates.
    #[serde(default)]
    pub tools: Vec<String>,

    /// Prompt templates by name.
    #[serde(default)]
    pub prompts: HashMap<String, String>,
}

impl AgentConfig {
    /// Load `path`, degrading to the default on any problem.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No agent config, using defaults");
            return Self::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read agent config");
                return Self::default();
            }
        };

        match Self::from_json(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid agent config JSON");
                Self::default()
            }
        }
    }

    /// Parse a `config.json` document. Only invalid JSON is an error.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Value>(content).map(|value| Self::from_value(&value))
    }

    /// Build a config from an already-parsed document, coercing every
    /// scalar to a string.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let name = obj.get("name").map(coerce_string).unwrap_or_default();
        let description = obj.get("description").map(coerce_string).unwrap_or_default();

        let mut tools: Vec<String> = Vec::new();
        if let Some(Value::Array(items)) = obj.get("tools") {
            for tool in items.iter().map(coerce_string) {
                if !tools.contains(&tool) {
                    tools.push(tool);
                }
            }
        }

        let prompts = match obj.get("prompts") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), coerce_string(v)))
                .collect(),
            _ => HashMap::new(),
        };

        Self {
            name,
            description,
            tools,
            prompts,
        }
    }

    pub fn templates(&self) -> PromptTemplates {
        PromptTemplates::from(self.prompts.clone())
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_config() {
        let config = AgentConfig::from_value(&json!({
            "name": "research_summarizer",
            "description": "Summarize PDFs",
            "tools": ["pdf_reader", "pdf_reader"],
            "prompts": {"chunk_summary": "Text:\n{chunk}\n"}
        }));

        assert_eq!(config.name, "research_summarizer");
        assert_eq!(config.description, "Summarize PDFs");
        assert_eq!(config.tools, vec!["pdf_reader"]);
        assert_eq!(
            config.templates().get("chunk_summary", "fallback"),
            "Text:\n{chunk}\n"
        );
    }

    #[test]
    fn test_prompts_not_a_mapping() {
        let config = AgentConfig::from_value(&json!({"prompts": "not-a-dict"}));
        let templates = config.templates();
        assert!(templates.is_empty());
        assert_eq!(templates.get("x", "fallback"), "fallback");
    }

    #[test]
    fn test_tools_not_a_list() {
        let config = AgentConfig::from_value(&json!({"tools": "pdf_reader"}));
        assert!(config.tools.is_empty());
    }

    #[test]
    fn test_values_coerced_to_strings() {
        let config = AgentConfig::from_value(&json!({
            "name": 7,
            "description": true,
            "tools": [1, "pdf_reader"],
            "prompts": {"n": 3}
        }));

        assert_eq!(config.name, "7");
        assert_eq!(config.description, "true");
        assert_eq!(config.tools, vec!["1", "pdf_reader"]);
        assert_eq!(config.prompts.get("n").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_non_object_document() {
        assert_eq!(AgentConfig::from_value(&json!([1, 2])), AgentConfig::default());
    }

    #[test]
    fn test_load_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            AgentConfig::load(&dir.path().join("config.json")),
            AgentConfig::default()
        );

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(AgentConfig::load(&path), AgentConfig::default());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"description": "From disk"}"#).unwrap();
        assert_eq!(AgentConfig::load(&path).description, "From disk");
    }
}
