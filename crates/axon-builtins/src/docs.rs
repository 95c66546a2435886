use async_trait::async_trait;
use axon_core::{Agent, AxonResult};
use serde_json::{json, Value};
use tracing::debug;

/// Markdown rendering agent, registered as `documentation`.
///
/// Answers the `generate` action by rendering the accumulated
/// `previous_results` into a markdown report, one section per stored step
/// result.
pub struct DocumentationAgent;

impl DocumentationAgent {
    pub fn new() -> Self {
        Self
    }

    fn generate(&self, payload: &Value) -> Value {
        let title = payload
            .get("parameters")
            .and_then(|p| p.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("Workflow Report");

        let mut document = format!("# {title}\n");
        let mut sections = 0;

        if let Some(previous) = payload.get("previous_results").and_then(Value::as_object) {
            for (key, result) in previous {
                document.push_str(&format!("\n## {key}\n\n"));
                document.push_str(&render_section(result));
                sections += 1;
            }
        }

        if sections == 0 {
            document.push_str("\nNo step results recorded.\n");
        }

        json!({
            "document": document,
            "format": "markdown",
            "sections": sections,
        })
    }
}

impl Default for DocumentationAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for DocumentationAgent {
    fn name(&self) -> &str {
        "documentation"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["documentation_rendering".to_string()]
    }

    async fn handle_event(&self, event_type: &str, payload: Value) -> AxonResult<Option<Value>> {
        match event_type {
            "generate" => {
                debug!("Generating documentation");
                Ok(Some(self.generate(&payload)))
            }
            _ => Ok(None),
        }
    }
}

/// Render one step result: objects become bullet lists, everything else is
/// printed inline.
fn render_section(result: &Value) -> String {
    match result.as_object() {
        Some(map) => {
            let mut section = String::new();
            for (field, value) in map {
                section.push_str(&format!("- **{field}**: {value}\n"));
            }
            section
        }
        None => format!("{result}\n"),
    }
}
