use async_trait::async_trait;
use axon_core::{Agent, AxonResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// Heuristic text analysis agent, registered as `semantic_analysis`.
///
/// Answers the `analyze` action with word/sentence statistics, the dominant
/// terms, and a significance score in `1..=10`. All other actions are
/// absent.
pub struct TextAnalysisAgent;

impl TextAnalysisAgent {
    pub fn new() -> Self {
        Self
    }

    fn analyze(&self, payload: &Value) -> Value {
        let content = extract_content(payload);
        let words: Vec<&str> = content.split_whitespace().collect();
        let word_count = words.len();
        let sentence_count = content
            .split(['.', '!', '?'])
            .filter(|s| !s.trim().is_empty())
            .count();

        let keywords = dominant_terms(&words, 5);
        // Longer texts with a richer vocabulary score higher, capped at 10.
        let significance = (1 + word_count / 20 + keywords.len()).min(10);

        let analysis = if word_count == 0 {
            "No content provided".to_string()
        } else {
            format!(
                "{word_count} words across {sentence_count} sentences; dominant terms: {}",
                keywords.join(", ")
            )
        };

        json!({
            "analysis": analysis,
            "significance": significance,
            "keywords": keywords,
            "word_count": word_count,
            "sentence_count": sentence_count,
        })
    }
}

impl Default for TextAnalysisAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for TextAnalysisAgent {
    fn name(&self) -> &str {
        "semantic_analysis"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["text_analysis".to_string(), "significance_scoring".to_string()]
    }

    async fn handle_event(&self, event_type: &str, payload: Value) -> AxonResult<Option<Value>> {
        match event_type {
            "analyze" => {
                debug!("Analyzing content");
                Ok(Some(self.analyze(&payload)))
            }
            _ => Ok(None),
        }
    }
}

/// Pull the text to analyze out of a step payload: `parameters.content`
/// first, then `parameters.text`, then an empty string.
fn extract_content(payload: &Value) -> String {
    let parameters = payload.get("parameters").unwrap_or(&Value::Null);
    parameters
        .get("content")
        .or_else(|| parameters.get("text"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// The `limit` most frequent normalized words of four letters or more,
/// most frequent first, ties broken alphabetically.
fn dominant_terms(words: &[&str], limit: usize) -> Vec<String> {
    let mut frequencies: HashMap<String, usize> = HashMap::new();
    for word in words {
        let normalized: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if normalized.chars().count() >= 4 {
            *frequencies.entry(normalized).or_insert(0) += 1;
        }
    }
    let mut terms: Vec<(String, usize)> = frequencies.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    terms.into_iter().take(limit).map(|(term, _)| term).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload(content: &str) -> Value {
        json!({ "parameters": { "content": content } })
    }

    #[tokio::test]
    async fn test_analyze_counts_and_keywords() {
        let agent = TextAnalysisAgent::new();
        let result = agent
            .handle_event(
                "analyze",
                payload("Rust workflows coordinate agents. Rust workflows scale well."),
            )
            .await
            .unwrap()
            .expect("analyze should answer");
        assert_eq!(result["word_count"], 8);
        assert_eq!(result["sentence_count"], 2);
        let keywords: Vec<&str> = result["keywords"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keywords[0], "rust");
        assert!(keywords.contains(&"workflows"));
        assert!(result["significance"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_analyze_empty_content() {
        let agent = TextAnalysisAgent::new();
        let result = agent
            .handle_event("analyze", json!({}))
            .await
            .unwrap()
            .expect("analyze should answer");
        assert_eq!(result["word_count"], 0);
        assert_eq!(result["analysis"], "No content provided");
        assert_eq!(result["significance"], 1);
    }

    #[tokio::test]
    async fn test_analyze_accepts_text_key() {
        let agent = TextAnalysisAgent::new();
        let result = agent
            .handle_event("analyze", json!({ "parameters": { "text": "short note" } }))
            .await
            .unwrap()
            .expect("analyze should answer");
        assert_eq!(result["word_count"], 2);
    }

    #[tokio::test]
    async fn test_foreign_action_is_absent() {
        let agent = TextAnalysisAgent::new();
        let result = agent.handle_event("update", json!({})).await.unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_significance_is_capped() {
        let agent = TextAnalysisAgent::new();
        let long_text = "meaningful ".repeat(500);
        let result = agent.analyze(&payload(&long_text));
        assert_eq!(result["significance"], 10);
    }
}
