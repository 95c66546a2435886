use crate::types::{StepStatus, WorkflowExecution};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// Error substrings that mark a rule violation as critical. Critical error
/// sets are never auto-corrected.
const CRITICAL_PATTERNS: [&str; 3] = ["missing required field", "invalid format", "critical failure"];

/// Numeric thresholds and switches for the validation engine, loaded once
/// at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaThresholds {
    /// Significance floor for `semantic_analysis` outputs (below it: warning).
    #[serde(default = "default_min_significance")]
    pub min_significance: f64,
    /// Entity floor for `knowledge_graph` outputs (below it: error).
    #[serde(default = "default_min_entities")]
    pub min_entities: usize,
    /// Accepted but not consulted; kept for compatibility with existing
    /// threshold configurations.
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
    /// Minimum completed-step ratio for a workflow to pass final validation.
    #[serde(default = "default_min_completeness")]
    pub min_completeness: f64,
    /// Attempt best-effort auto-correction of non-critical failures.
    #[serde(default = "default_auto_correction")]
    pub auto_correction: bool,
}

fn default_min_significance() -> f64 {
    5.0
}
fn default_min_entities() -> usize {
    1
}
fn default_max_errors() -> usize {
    3
}
fn default_min_completeness() -> f64 {
    0.8
}
fn default_auto_correction() -> bool {
    true
}

impl Default for QaThresholds {
    fn default() -> Self {
        Self {
            min_significance: default_min_significance(),
            min_entities: default_min_entities(),
            max_errors: default_max_errors(),
            min_completeness: default_min_completeness(),
            auto_correction: default_auto_correction(),
        }
    }
}

/// Per-agent-id validation rules, derived from [`QaThresholds`] at engine
/// construction and read-only thereafter.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub required_fields: Vec<String>,
    pub min_significance: Option<f64>,
    pub min_entities: Option<usize>,
    /// Accepted but not consulted.
    pub max_errors: Option<usize>,
}

/// Outcome of one validation call. Immutable once appended to an
/// execution's report list.
#[derive(Debug, Clone, Serialize)]
pub struct QaReport {
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub corrected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_output: Option<Value>,
    /// Completed-step ratio; workflow-level reports only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<f64>,
    /// Failed-step count; workflow-level reports only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_steps: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

/// Validates agent outputs against per-agent rule sets and whole executions
/// against a completeness floor, with best-effort auto-correction of
/// non-critical failures.
pub struct QaEngine {
    thresholds: QaThresholds,
    rules: HashMap<String, ValidationRules>,
}

impl QaEngine {
    pub fn new(thresholds: QaThresholds) -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            "semantic_analysis".to_string(),
            ValidationRules {
                required_fields: vec!["analysis".to_string(), "significance".to_string()],
                min_significance: Some(thresholds.min_significance),
                min_entities: None,
                max_errors: Some(thresholds.max_errors),
            },
        );
        rules.insert(
            "knowledge_graph".to_string(),
            ValidationRules {
                required_fields: vec!["entities".to_string(), "relations".to_string()],
                min_significance: None,
                min_entities: Some(thresholds.min_entities),
                max_errors: None,
            },
        );
        Self { thresholds, rules }
    }

    /// The rule set for a given agent id, if any.
    pub fn rules_for(&self, agent_id: &str) -> Option<&ValidationRules> {
        self.rules.get(agent_id)
    }

    /// Validate a single agent output.
    ///
    /// Missing required fields are errors; agent-class checks add a
    /// low-significance warning for `semantic_analysis` and an
    /// insufficient-entities error for `knowledge_graph`. When errors exist,
    /// none match a critical pattern, and correction is enabled, a patched
    /// copy of the output is attached as `corrected_output`.
    pub fn validate_output(
        &self,
        agent_id: &str,
        output: &Value,
        context: Option<&Value>,
    ) -> QaReport {
        debug!(agent_id = %agent_id, context = ?context, "Validating agent output");

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Some(rules) = self.rules.get(agent_id) {
            for field in &rules.required_fields {
                if output.get(field).is_none() {
                    errors.push(format!("Missing required field: {field}"));
                }
            }

            if agent_id == "semantic_analysis" {
                let significance = output
                    .get("significance")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                let min = rules.min_significance.unwrap_or(self.thresholds.min_significance);
                if significance < min {
                    warnings.push(format!("Low significance score: {significance} < {min}"));
                }
            } else if agent_id == "knowledge_graph" {
                let entity_count = output
                    .get("entities")
                    .and_then(Value::as_array)
                    .map(|a| a.len())
                    .unwrap_or(0);
                let min = rules.min_entities.unwrap_or(self.thresholds.min_entities);
                if entity_count < min {
                    errors.push(format!("Insufficient entities: {entity_count} < {min}"));
                }
            }
        }

        let corrected_output = if self.thresholds.auto_correction
            && !errors.is_empty()
            && !Self::is_critical(&errors)
        {
            Some(self.auto_correct(agent_id, output))
        } else {
            None
        };

        QaReport {
            passed: errors.is_empty(),
            errors,
            warnings,
            corrected: corrected_output.is_some(),
            corrected_output,
            completeness: None,
            failed_steps: None,
            timestamp: Utc::now(),
        }
    }

    /// Whether any error matches a critical pattern (case-insensitive
    /// substring scan). One match taints the whole set.
    ///
    /// Note: missing-required-field errors always match the first pattern
    /// because the scan runs over the very text this engine generates, so
    /// the missing-field branch of [`auto_correct`](Self::auto_correct) is
    /// unreachable through [`validate_output`](Self::validate_output). The
    /// behavior is inherited and pinned by tests; callers must not rely on
    /// missing fields being filled.
    pub fn is_critical(errors: &[String]) -> bool {
        errors.iter().any(|error| {
            let lower = error.to_lowercase();
            CRITICAL_PATTERNS.iter().any(|pattern| lower.contains(pattern))
        })
    }

    /// Best-effort correction: fill recognized missing required fields with
    /// type-appropriate placeholders. Returns a patched copy; unrecognized
    /// fields and non-object outputs are left untouched.
    fn auto_correct(&self, agent_id: &str, output: &Value) -> Value {
        let mut corrected = output.clone();
        let Some(rules) = self.rules.get(agent_id) else {
            return corrected;
        };
        let Some(map) = corrected.as_object_mut() else {
            return corrected;
        };
        for field in &rules.required_fields {
            if map.contains_key(field) {
                continue;
            }
            let placeholder = match field.as_str() {
                "significance" => json!(5),
                "analysis" => json!("Auto-generated analysis placeholder"),
                "entities" | "relations" => json!([]),
                _ => continue,
            };
            map.insert(field.clone(), placeholder);
        }
        corrected
    }

    /// Validate a whole execution: completeness against the configured
    /// minimum, one error per failed step, one warning per step that
    /// finished later than its timeout allowed (a step can finish late
    /// without being cancelled).
    pub fn validate_workflow(&self, execution: &WorkflowExecution) -> QaReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let total = execution.steps.len();
        let completed = execution.completed_step_count();
        let completeness = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };
        if completeness < self.thresholds.min_completeness {
            errors.push(format!(
                "Workflow incomplete: {completeness:.2} < {}",
                self.thresholds.min_completeness
            ));
        }

        let failed: Vec<_> = execution
            .steps
            .iter()
            .filter(|step| step.status == StepStatus::Failed)
            .collect();
        for step in &failed {
            errors.push(format!(
                "Step failed: {}.{} - {}",
                step.agent,
                step.action,
                step.error.as_deref().unwrap_or("unknown error")
            ));
        }

        for step in &execution.steps {
            if let Some(duration) = step.duration_secs() {
                if duration > step.timeout as f64 {
                    warnings.push(format!(
                        "Step timeout exceeded: {}.{} took {duration:.1}s > {}s",
                        step.agent, step.action, step.timeout
                    ));
                }
            }
        }

        QaReport {
            passed: errors.is_empty(),
            errors,
            warnings,
            corrected: false,
            corrected_output: None,
            completeness: Some(completeness),
            failed_steps: Some(failed.len()),
            timestamp: Utc::now(),
        }
    }
}
