use async_trait::async_trait;
use axon_core::{Agent, AxonResult};
use serde_json::{json, Value};
use tracing::debug;

/// Entity and relation extraction agent, registered as `knowledge_graph`.
///
/// Answers the `update` action: proper-noun-like tokens from the input
/// content become entities, enriched with keywords produced by an earlier
/// `semantic_analysis` step when one is present in `previous_results`.
/// Adjacent entities are linked pairwise.
pub struct KnowledgeGraphAgent;

impl KnowledgeGraphAgent {
    pub fn new() -> Self {
        Self
    }

    fn update(&self, payload: &Value) -> Value {
        let parameters = payload.get("parameters").unwrap_or(&Value::Null);
        let content = parameters
            .get("content")
            .or_else(|| parameters.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("");

        let mut entities = capitalized_tokens(content);

        // Earlier analysis output feeds the graph through previous_results.
        if let Some(previous) = payload.get("previous_results").and_then(Value::as_object) {
            for (key, result) in previous {
                if !key.contains("semantic_analysis") {
                    continue;
                }
                let keywords = result
                    .get("keywords")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str);
                for keyword in keywords {
                    if !entities.iter().any(|e| e == keyword) {
                        entities.push(keyword.to_string());
                    }
                }
            }
        }

        let relations: Vec<Value> = entities
            .windows(2)
            .map(|pair| {
                json!({
                    "source": pair[0],
                    "target": pair[1],
                    "kind": "adjacent",
                })
            })
            .collect();

        json!({
            "entities": entities,
            "relations": relations,
            "entity_count": entities.len(),
            "relation_count": relations.len(),
        })
    }
}

impl Default for KnowledgeGraphAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for KnowledgeGraphAgent {
    fn name(&self) -> &str {
        "knowledge_graph"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["entity_extraction".to_string(), "graph_maintenance".to_string()]
    }

    async fn handle_event(&self, event_type: &str, payload: Value) -> AxonResult<Option<Value>> {
        match event_type {
            "update" => {
                debug!("Updating knowledge graph");
                Ok(Some(self.update(&payload)))
            }
            _ => Ok(None),
        }
    }
}

/// Capitalized alphabetic tokens in first-seen order, deduplicated.
fn capitalized_tokens(content: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in content.split_whitespace() {
        let cleaned: String = word.chars().filter(|c| c.is_alphabetic()).collect();
        let mut chars = cleaned.chars();
        let is_candidate = matches!(chars.next(), Some(first) if first.is_uppercase())
            && cleaned.chars().count() > 1;
        if is_candidate && !tokens.contains(&cleaned) {
            tokens.push(cleaned);
        }
    }
    tokens
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_extracts_entities_and_relations() {
        let agent = KnowledgeGraphAgent::new();
        let result = agent
            .handle_event(
                "update",
                json!({ "parameters": { "content": "Alice told Bob that Alice trusts Carol." } }),
            )
            .await
            .unwrap()
            .expect("update should answer");
        let entities: Vec<&str> = result["entities"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(entities, vec!["Alice", "Bob", "Carol"]);
        assert_eq!(result["relation_count"], 2);
        assert_eq!(result["relations"][0]["source"], "Alice");
        assert_eq!(result["relations"][0]["target"], "Bob");
    }

    #[tokio::test]
    async fn test_update_merges_previous_analysis_keywords() {
        let agent = KnowledgeGraphAgent::new();
        let result = agent
            .handle_event(
                "update",
                json!({
                    "parameters": { "content": "Axon coordinates agents." },
                    "previous_results": {
                        "step_0_semantic_analysis_analyze": {
                            "keywords": ["coordination", "agents"]
                        }
                    }
                }),
            )
            .await
            .unwrap()
            .expect("update should answer");
        let entities: Vec<&str> = result["entities"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(entities, vec!["Axon", "coordination", "agents"]);
    }

    #[tokio::test]
    async fn test_update_empty_content_yields_no_entities() {
        let agent = KnowledgeGraphAgent::new();
        let result = agent
            .handle_event("update", json!({}))
            .await
            .unwrap()
            .expect("update should answer");
        assert_eq!(result["entity_count"], 0);
        assert_eq!(result["relations"], json!([]));
    }

    #[tokio::test]
    async fn test_foreign_action_is_absent() {
        let agent = KnowledgeGraphAgent::new();
        let result = agent.handle_event("analyze", json!({})).await.unwrap();
        assert!(result.is_none());
    }
}
