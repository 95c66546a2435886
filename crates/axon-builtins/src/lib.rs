//! Built-in reference agents for the Axon framework.
//!
//! Small, dependency-light agents covering the default workflow roster:
//! text analysis, knowledge-graph maintenance, and documentation
//! rendering. They compute everything locally so a workflow can run end to
//! end without external services, and they demonstrate the handle-event
//! contract each production agent implements.

/// Heuristic text analysis agent (`semantic_analysis`).
pub mod analysis;
/// Entity/relation extraction agent (`knowledge_graph`).
pub mod graph;
/// Markdown rendering agent (`documentation`).
pub mod docs;

pub use analysis::TextAnalysisAgent;
pub use docs::DocumentationAgent;
pub use graph::KnowledgeGraphAgent;

use axon_core::AgentSystem;
use std::sync::Arc;

/// Register every built-in agent on the given system.
pub fn register_builtins(system: &AgentSystem) {
    system.register(Arc::new(TextAnalysisAgent::new()));
    system.register(Arc::new(KnowledgeGraphAgent::new()));
    system.register(Arc::new(DocumentationAgent::new()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtins() {
        let system = AgentSystem::new();
        register_builtins(&system);
        assert_eq!(
            system.names(),
            vec!["documentation", "knowledge_graph", "semantic_analysis"]
        );
    }
}
