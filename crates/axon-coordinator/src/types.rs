use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Status of a whole workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Pending => write!(f, "pending"),
            WorkflowStatus::Running => write!(f, "running"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Status of an individual step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Catalog-side description of a single step: which agent, which action,
/// and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Target agent name.
    pub agent: String,
    /// Action dispatched to the agent as the event type.
    pub action: String,
    /// Per-step timeout in seconds.
    #[serde(default = "default_step_timeout")]
    pub timeout: u64,
}

fn default_step_timeout() -> u64 {
    60
}

impl StepSpec {
    pub fn new(agent: impl Into<String>, action: impl Into<String>, timeout: u64) -> Self {
        Self {
            agent: agent.into(),
            action: action.into(),
            timeout,
        }
    }
}

/// Per-workflow configuration bag.
///
/// `min_completeness` and `max_retries` are accepted for compatibility with
/// existing workflow definitions but are not consulted: completeness is
/// judged against the QA engine's configured minimum, and failed steps are
/// never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Validate each step's output (and the whole run) with the QA engine.
    #[serde(default)]
    pub qa_validation: bool,
    /// Continue past a failed step instead of aborting.
    #[serde(default)]
    pub allow_partial_completion: bool,
    /// Accepted but not consulted; see the QA engine's thresholds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_completeness: Option<f64>,
    /// Maximum wall-clock lifetime in seconds before the stuck-workflow
    /// monitor force-fails the execution.
    #[serde(default = "default_max_duration")]
    pub max_duration: u64,
    /// Accepted but not consulted; steps are never retried.
    #[serde(default)]
    pub max_retries: u32,
}

fn default_max_duration() -> u64 {
    600
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            qa_validation: false,
            allow_partial_completion: false,
            min_completeness: None,
            max_duration: default_max_duration(),
            max_retries: 0,
        }
    }
}

/// An immutable catalog entry: a named, ordered list of steps with shared
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<StepSpec>,
    #[serde(default)]
    pub config: WorkflowConfig,
}

/// Runtime state of a single step within one execution.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStep {
    pub agent: String,
    pub action: String,
    pub timeout: u64,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl WorkflowStep {
    pub fn from_spec(spec: &StepSpec) -> Self {
        Self {
            agent: spec.agent.clone(),
            action: spec.action.clone(),
            timeout: spec.timeout,
            status: StepStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Measured duration in seconds, if the step both started and ended.
    pub fn duration_secs(&self) -> Option<f64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => {
                Some(end.signed_duration_since(start).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }
}

/// Insertion-ordered mapping from result key to step output.
///
/// Keys follow the `"step_{index}_{agent}_{action}"` convention, so
/// iteration order is completion order. Stored values are handed to later
/// steps untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    entries: Vec<(String, Value)>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result under `key`, preserving insertion order.
    pub fn insert(&mut self, key: String, value: Value) {
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Snapshot as a JSON object, for embedding in a step payload.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// One running (or finished) instance of a workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub steps: Vec<WorkflowStep>,
    pub status: WorkflowStatus,
    pub parameters: Value,
    pub config: WorkflowConfig,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub current_step_index: usize,
    pub results: ResultSet,
    pub qa_reports: Vec<crate::qa::QaReport>,
}

impl WorkflowExecution {
    /// Build a pending execution from a catalog entry. The step list length
    /// is fixed here and never changes afterwards.
    pub fn new(name: impl Into<String>, spec: &WorkflowSpec, parameters: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: spec.description.clone(),
            steps: spec.steps.iter().map(WorkflowStep::from_spec).collect(),
            status: WorkflowStatus::Pending,
            parameters,
            config: spec.config.clone(),
            started_at: Utc::now(),
            ended_at: None,
            current_step_index: 0,
            results: ResultSet::new(),
            qa_reports: Vec::new(),
        }
    }

    /// Seconds elapsed since the execution started.
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        now.signed_duration_since(self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Total duration in seconds, once ended.
    pub fn duration_secs(&self) -> Option<f64> {
        self.ended_at.map(|end| {
            end.signed_duration_since(self.started_at).num_milliseconds() as f64 / 1000.0
        })
    }

    pub fn completed_step_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }
}

/// What `execute_workflow` returns immediately: the new execution's id,
/// its status at spawn time, and its step count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    pub steps: usize,
}

/// Per-step view inside a [`StatusReport`].
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub agent: String,
    pub action: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot answering `get_workflow_status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub workflow_id: Uuid,
    pub name: String,
    pub status: WorkflowStatus,
    pub current_step: usize,
    pub total_steps: usize,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub steps: Vec<StepReport>,
    pub qa_reports: usize,
    pub results_available: bool,
}

impl StatusReport {
    pub fn from_execution(execution: &WorkflowExecution) -> Self {
        Self {
            workflow_id: execution.id,
            name: execution.name.clone(),
            status: execution.status,
            current_step: execution.current_step_index,
            total_steps: execution.steps.len(),
            started_at: execution.started_at,
            ended_at: execution.ended_at,
            duration: execution.duration_secs(),
            steps: execution
                .steps
                .iter()
                .map(|step| StepReport {
                    agent: step.agent.clone(),
                    action: step.action.clone(),
                    status: step.status,
                    duration: step.duration_secs(),
                    error: step.error.clone(),
                })
                .collect(),
            qa_reports: execution.qa_reports.len(),
            results_available: !execution.results.is_empty(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec_with_steps(n: usize) -> WorkflowSpec {
        WorkflowSpec {
            name: "test".to_string(),
            description: "test workflow".to_string(),
            steps: (0..n)
                .map(|i| StepSpec::new(format!("agent_{i}"), "act", 30))
                .collect(),
            config: WorkflowConfig::default(),
        }
    }

    #[test]
    fn test_status_serialization_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!(
            serde_json::to_string(&StepStatus::Skipped).unwrap(),
            "\"skipped\""
        );
    }

    #[test]
    fn test_step_spec_default_timeout() {
        let spec: StepSpec =
            serde_json::from_value(json!({"agent": "a", "action": "b"})).unwrap();
        assert_eq!(spec.timeout, 60);
    }

    #[test]
    fn test_workflow_config_defaults() {
        let config: WorkflowConfig = serde_json::from_value(json!({})).unwrap();
        assert!(!config.qa_validation);
        assert!(!config.allow_partial_completion);
        assert_eq!(config.max_duration, 600);
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_execution_from_spec() {
        let execution = WorkflowExecution::new("test", &spec_with_steps(3), json!({"k": "v"}));
        assert_eq!(execution.status, WorkflowStatus::Pending);
        assert_eq!(execution.steps.len(), 3);
        assert!(execution
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Pending));
        assert_eq!(execution.current_step_index, 0);
        assert!(execution.results.is_empty());
    }

    #[test]
    fn test_result_set_preserves_insertion_order() {
        let mut results = ResultSet::new();
        for i in [3, 0, 12, 7] {
            results.insert(format!("step_{i}_a_b"), json!(i));
        }
        let keys: Vec<&str> = results.keys().collect();
        assert_eq!(
            keys,
            vec!["step_3_a_b", "step_0_a_b", "step_12_a_b", "step_7_a_b"]
        );
        // The serialized form keeps the same order.
        let json = serde_json::to_string(&results).unwrap();
        assert!(json.find("step_3_a_b").unwrap() < json.find("step_0_a_b").unwrap());
        assert!(json.find("step_12_a_b").unwrap() < json.find("step_7_a_b").unwrap());
    }

    #[test]
    fn test_result_set_roundtrip_is_identical() {
        let mut results = ResultSet::new();
        let original = json!({"analysis": "text", "significance": 7, "nested": {"deep": [1, 2]}});
        results.insert("step_0_a_analyze".to_string(), original.clone());
        let snapshot = results.to_value();
        assert_eq!(snapshot["step_0_a_analyze"], original);
        assert_eq!(
            serde_json::to_vec(&snapshot["step_0_a_analyze"]).unwrap(),
            serde_json::to_vec(&original).unwrap()
        );
    }

    #[test]
    fn test_step_duration() {
        let mut step = WorkflowStep::from_spec(&StepSpec::new("a", "b", 10));
        assert!(step.duration_secs().is_none());
        let start = Utc::now();
        step.started_at = Some(start);
        step.ended_at = Some(start + chrono::Duration::milliseconds(1500));
        assert_eq!(step.duration_secs(), Some(1.5));
    }

    #[test]
    fn test_status_report_shape() {
        let mut execution = WorkflowExecution::new("test", &spec_with_steps(2), json!({}));
        execution.steps[0].status = StepStatus::Completed;
        execution.results.insert("step_0_agent_0_act".to_string(), json!(1));
        let report = StatusReport::from_execution(&execution);
        assert_eq!(report.total_steps, 2);
        assert!(report.results_available);
        assert_eq!(report.steps[0].status, StepStatus::Completed);
        assert_eq!(report.steps[1].status, StepStatus::Pending);
    }
}
