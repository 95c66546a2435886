use crate::types::{StepSpec, WorkflowConfig, WorkflowSpec};
use std::collections::HashMap;
use tracing::debug;

/// Agent targeted by synthesized descriptors.
pub const DEFAULT_AGENT: &str = "semantic_analysis";
/// Action targeted by synthesized descriptors.
pub const DEFAULT_ACTION: &str = "analyze";

/// Static collection of workflow descriptors.
///
/// Entries are immutable once registered. Requests for names the catalog
/// does not know are answered by synthesis: two recognized alias pairs map
/// to fixed descriptors, and anything else gets a minimal one-step default.
/// Synthesis is a convenience path and carries no validation of its own.
pub struct WorkflowCatalog {
    specs: HashMap<String, WorkflowSpec>,
}

impl WorkflowCatalog {
    pub fn new() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    /// Build a catalog from pre-defined descriptors, keyed by their names.
    pub fn with_specs(specs: Vec<WorkflowSpec>) -> Self {
        let mut catalog = Self::new();
        for spec in specs {
            catalog.register(spec);
        }
        catalog
    }

    /// Register a descriptor under its own name.
    pub fn register(&mut self, spec: WorkflowSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowSpec> {
        self.specs.get(name)
    }

    /// Registered workflow names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.specs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Resolve a workflow request to a concrete descriptor.
    ///
    /// An explicit descriptor supplied by the caller always wins; otherwise
    /// a registered entry is used, and failing that one is synthesized.
    pub fn resolve(&self, name: &str, explicit: Option<WorkflowSpec>) -> WorkflowSpec {
        if let Some(mut spec) = explicit {
            if spec.name.is_empty() {
                spec.name = name.to_string();
            }
            return spec;
        }
        if let Some(spec) = self.specs.get(name) {
            return spec.clone();
        }
        debug!(workflow = %name, "No descriptor registered, synthesizing default");
        Self::synthesize(name)
    }

    /// Synthesize a descriptor for an unknown workflow name.
    fn synthesize(name: &str) -> WorkflowSpec {
        let steps = match name {
            "complete-analysis" | "full-analysis" => vec![
                StepSpec::new(DEFAULT_AGENT, DEFAULT_ACTION, 120),
                StepSpec::new("knowledge_graph", "update", 60),
                StepSpec::new("documentation", "generate", 60),
            ],
            "simple-analysis" | "quick-analysis" => {
                vec![StepSpec::new(DEFAULT_AGENT, DEFAULT_ACTION, 60)]
            }
            _ => vec![StepSpec::new(DEFAULT_AGENT, DEFAULT_ACTION, 60)],
        };
        WorkflowSpec {
            name: name.to_string(),
            description: format!("Default workflow for {name}"),
            steps,
            config: WorkflowConfig::default(),
        }
    }
}

impl Default for WorkflowCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_analysis_alias() {
        let catalog = WorkflowCatalog::new();
        for name in ["complete-analysis", "full-analysis"] {
            let spec = catalog.resolve(name, None);
            assert_eq!(spec.steps.len(), 3);
            assert_eq!(spec.steps[0].agent, "semantic_analysis");
            assert_eq!(spec.steps[0].timeout, 120);
            assert_eq!(spec.steps[1].agent, "knowledge_graph");
            assert_eq!(spec.steps[1].action, "update");
            assert_eq!(spec.steps[2].agent, "documentation");
            assert_eq!(spec.steps[2].action, "generate");
        }
    }

    #[test]
    fn test_simple_analysis_alias() {
        let catalog = WorkflowCatalog::new();
        for name in ["simple-analysis", "quick-analysis"] {
            let spec = catalog.resolve(name, None);
            assert_eq!(spec.steps.len(), 1);
            assert_eq!(spec.steps[0].action, "analyze");
            assert_eq!(spec.steps[0].timeout, 60);
        }
    }

    #[test]
    fn test_unknown_name_synthesizes_generic() {
        let catalog = WorkflowCatalog::new();
        let spec = catalog.resolve("never-heard-of-it", None);
        assert_eq!(spec.steps.len(), 1);
        assert_eq!(spec.steps[0].agent, DEFAULT_AGENT);
        assert_eq!(spec.name, "never-heard-of-it");
        assert!(spec.description.contains("never-heard-of-it"));
    }

    #[test]
    fn test_registered_entry_wins_over_synthesis() {
        let mut catalog = WorkflowCatalog::new();
        catalog.register(WorkflowSpec {
            name: "simple-analysis".to_string(),
            description: "custom".to_string(),
            steps: vec![StepSpec::new("custom_agent", "go", 5)],
            config: WorkflowConfig::default(),
        });
        let spec = catalog.resolve("simple-analysis", None);
        assert_eq!(spec.steps[0].agent, "custom_agent");
    }

    #[test]
    fn test_explicit_descriptor_wins() {
        let catalog = WorkflowCatalog::new();
        let explicit = WorkflowSpec {
            name: String::new(),
            description: "caller supplied".to_string(),
            steps: vec![StepSpec::new("x", "y", 1)],
            config: WorkflowConfig::default(),
        };
        let spec = catalog.resolve("complete-analysis", Some(explicit));
        assert_eq!(spec.steps.len(), 1);
        assert_eq!(spec.steps[0].agent, "x");
        // The requested name is filled in when the caller left it blank.
        assert_eq!(spec.name, "complete-analysis");
    }

    #[test]
    fn test_names_sorted() {
        let catalog = WorkflowCatalog::with_specs(vec![
            WorkflowSpec {
                name: "zeta".to_string(),
                description: String::new(),
                steps: vec![],
                config: WorkflowConfig::default(),
            },
            WorkflowSpec {
                name: "alpha".to_string(),
                description: String::new(),
                steps: vec![],
                config: WorkflowConfig::default(),
            },
        ]);
        assert_eq!(catalog.names(), vec!["alpha", "zeta"]);
        assert_eq!(catalog.len(), 2);
    }
}
