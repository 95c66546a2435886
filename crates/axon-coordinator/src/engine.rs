use crate::catalog::WorkflowCatalog;
use crate::monitor::{MonitorHandle, StuckWorkflowMonitor};
use crate::qa::{QaEngine, QaThresholds};
use crate::types::{
    ExecutionReceipt, StatusReport, StepStatus, WorkflowConfig, WorkflowExecution, WorkflowSpec,
    WorkflowStatus,
};
use async_trait::async_trait;
use axon_core::{Agent, AgentSystem, AxonError, AxonResult};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Name the coordinator registers under on the dispatch bus.
pub const COORDINATOR_AGENT: &str = "coordinator";

pub(crate) type ActiveTable = Arc<RwLock<HashMap<Uuid, WorkflowExecution>>>;
pub(crate) type HistoryList = Arc<RwLock<Vec<WorkflowExecution>>>;

/// Tuning knobs for the coordinator and its stuck-workflow monitor.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// History cap; the sweep evicts the oldest entries beyond it.
    pub max_history: usize,
    /// Nominal sweep cadence.
    pub monitor_interval: Duration,
    /// Sweep cadence after a skipped cycle.
    pub monitor_backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_history: 100,
            monitor_interval: Duration::from_secs(30),
            monitor_backoff: Duration::from_secs(60),
        }
    }
}

/// The workflow execution engine.
///
/// Creates, runs, and finalizes [`WorkflowExecution`]s by stepping through a
/// catalog entry's step list against the dispatch bus, applying QA
/// validation between steps and again at completion. Each execution is
/// driven by its own spawned run task; the coordinator itself only ever
/// touches the shared active table and history list under their locks.
///
/// The coordinator is also an [`Agent`]: it answers `execute_workflow`,
/// `get_workflow_status`, `cancel_workflow`, and `validate_output` events
/// on the same bus as every other agent.
pub struct Coordinator {
    system: Arc<AgentSystem>,
    catalog: WorkflowCatalog,
    qa: Arc<QaEngine>,
    config: CoordinatorConfig,
    active: ActiveTable,
    history: HistoryList,
}

impl Coordinator {
    pub fn new(
        system: Arc<AgentSystem>,
        catalog: WorkflowCatalog,
        thresholds: QaThresholds,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            system,
            catalog,
            qa: Arc::new(QaEngine::new(thresholds)),
            config,
            active: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// The validation engine, for callers that validate outside a workflow.
    pub fn qa(&self) -> &QaEngine {
        &self.qa
    }

    /// The workflow catalog.
    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    /// Start the stuck-workflow monitor. The returned handle stops the
    /// sweep when dropped or explicitly stopped.
    pub fn start_monitor(&self) -> MonitorHandle {
        StuckWorkflowMonitor::new(
            self.active.clone(),
            self.history.clone(),
            self.config.clone(),
        )
        .spawn()
    }

    /// Start executing a named workflow.
    ///
    /// Synchronous only up to record creation: the execution is built,
    /// registered as active, and handed to an independent run task. The
    /// receipt is returned immediately, before any step runs.
    pub async fn execute_workflow(
        &self,
        name: &str,
        explicit: Option<WorkflowSpec>,
        parameters: Value,
    ) -> ExecutionReceipt {
        let spec = self.catalog.resolve(name, explicit);
        let execution = WorkflowExecution::new(name, &spec, parameters);
        let id = execution.id;
        let receipt = ExecutionReceipt {
            workflow_id: id,
            status: execution.status,
            steps: execution.steps.len(),
        };

        info!(
            workflow_id = %id,
            workflow_name = %name,
            steps = execution.steps.len(),
            "Starting workflow execution"
        );

        self.active.write().await.insert(id, execution);
        tokio::spawn(self.run_task().run(id));

        receipt
    }

    /// Status snapshot for an active or historical execution.
    pub async fn get_workflow_status(&self, id: Uuid) -> AxonResult<StatusReport> {
        if let Some(execution) = self.active.read().await.get(&id) {
            return Ok(StatusReport::from_execution(execution));
        }
        self.history
            .read()
            .await
            .iter()
            .find(|execution| execution.id == id)
            .map(StatusReport::from_execution)
            .ok_or_else(|| AxonError::Workflow(format!("Workflow not found: {id}")))
    }

    /// Full clone of an execution's record, searching active then history.
    pub async fn find_execution(&self, id: Uuid) -> Option<WorkflowExecution> {
        if let Some(execution) = self.active.read().await.get(&id) {
            return Some(execution.clone());
        }
        self.history
            .read()
            .await
            .iter()
            .find(|execution| execution.id == id)
            .cloned()
    }

    /// Cancel an active execution: flip it to cancelled, stamp its end
    /// time, and move it to history immediately. The run task is not
    /// signalled; it notices the removal at its next step boundary and
    /// abandons.
    pub async fn cancel_workflow(&self, id: Uuid) -> AxonResult<()> {
        let mut active = self.active.write().await;
        let mut history = self.history.write().await;
        let Some(mut execution) = active.remove(&id) else {
            return Err(AxonError::Workflow(format!(
                "Active workflow not found: {id}"
            )));
        };
        execution.status = WorkflowStatus::Cancelled;
        execution.ended_at = Some(Utc::now());
        history.push(execution);
        info!(workflow_id = %id, "Workflow cancelled");
        Ok(())
    }

    /// Cancel every active execution and drain the active table into
    /// history. Called once at process shutdown.
    pub async fn shutdown(&self) {
        let mut active = self.active.write().await;
        let mut history = self.history.write().await;
        let cancelled = active.len();
        for (_, mut execution) in active.drain() {
            execution.status = WorkflowStatus::Cancelled;
            execution.ended_at = Some(Utc::now());
            history.push(execution);
        }
        if cancelled > 0 {
            info!(cancelled, "Cancelled active workflows at shutdown");
        }
    }

    /// Number of executions currently in the active table.
    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    /// Number of executions in the history list.
    pub async fn history_count(&self) -> usize {
        self.history.read().await.len()
    }

    fn run_task(&self) -> RunTask {
        RunTask {
            system: self.system.clone(),
            qa: self.qa.clone(),
            active: self.active.clone(),
            history: self.history.clone(),
        }
    }
}

#[async_trait]
impl Agent for Coordinator {
    fn name(&self) -> &str {
        COORDINATOR_AGENT
    }

    fn capabilities(&self) -> Vec<String> {
        [
            "workflow_orchestration",
            "quality_assurance",
            "agent_coordination",
            "workflow_management",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
    }

    async fn handle_event(&self, event_type: &str, payload: Value) -> AxonResult<Option<Value>> {
        match event_type {
            "execute_workflow" => {
                let name = payload
                    .get("workflow_name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        AxonError::Workflow("execute_workflow requires a workflow_name".to_string())
                    })?
                    .to_string();
                let explicit = match payload.get("workflow_def") {
                    None | Some(Value::Null) => None,
                    Some(def) => Some(serde_json::from_value(def.clone())?),
                };
                let parameters = payload
                    .get("parameters")
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                let receipt = self.execute_workflow(&name, explicit, parameters).await;
                Ok(Some(serde_json::to_value(receipt)?))
            }
            "get_workflow_status" => {
                let id = parse_workflow_id(&payload)?;
                let report = self.get_workflow_status(id).await?;
                Ok(Some(serde_json::to_value(report)?))
            }
            "cancel_workflow" => {
                let id = parse_workflow_id(&payload)?;
                self.cancel_workflow(id).await?;
                Ok(Some(json!({
                    "workflow_id": id.to_string(),
                    "status": "cancelled",
                })))
            }
            "validate_output" => {
                let agent_id = payload
                    .get("agent_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        AxonError::Validation("validate_output requires an agent_id".to_string())
                    })?;
                let output = payload.get("output").cloned().unwrap_or(Value::Null);
                let report = self
                    .qa
                    .validate_output(agent_id, &output, payload.get("context"));
                Ok(Some(serde_json::to_value(report)?))
            }
            _ => Ok(None),
        }
    }
}

fn parse_workflow_id(payload: &Value) -> AxonResult<Uuid> {
    let raw = payload
        .get("workflow_id")
        .and_then(Value::as_str)
        .ok_or_else(|| AxonError::Workflow("missing workflow_id".to_string()))?;
    Uuid::parse_str(raw)
        .map_err(|e| AxonError::Workflow(format!("Invalid workflow id '{raw}': {e}")))
}

/// Everything a spawned run loop needs, detached from the coordinator's
/// lifetime.
struct RunTask {
    system: Arc<AgentSystem>,
    qa: Arc<QaEngine>,
    active: ActiveTable,
    history: HistoryList,
}

/// Per-iteration snapshot taken under the active-table lock so the lock is
/// never held across the dispatched agent call.
struct StepSnapshot {
    agent: String,
    action: String,
    timeout: u64,
    parameters: Value,
    previous_results: Value,
    config: WorkflowConfig,
}

impl RunTask {
    /// Mutate this task's execution if it is still active. `None` means the
    /// execution was removed from the active table (cancelled or
    /// force-failed by the sweep) and the run must abandon.
    async fn with_active<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut WorkflowExecution) -> R,
    ) -> Option<R> {
        self.active.write().await.get_mut(&id).map(f)
    }

    async fn run(self, id: Uuid) {
        let step_count = match self
            .with_active(id, |execution| {
                execution.status = WorkflowStatus::Running;
                execution.steps.len()
            })
            .await
        {
            Some(count) => count,
            None => return,
        };

        for index in 0..step_count {
            let snapshot = self
                .with_active(id, |execution| {
                    execution.current_step_index = index;
                    let step = &execution.steps[index];
                    StepSnapshot {
                        agent: step.agent.clone(),
                        action: step.action.clone(),
                        timeout: step.timeout,
                        parameters: execution.parameters.clone(),
                        previous_results: execution.results.to_value(),
                        config: execution.config.clone(),
                    }
                })
                .await;
            let Some(snapshot) = snapshot else { return };

            info!(
                workflow_id = %id,
                step_index = index,
                agent = %snapshot.agent,
                action = %snapshot.action,
                "Executing workflow step"
            );

            // Resolve before the step ever enters `running`; an unknown
            // agent is execution-fatal, not a skippable step.
            let Some(agent) = self.system.get(&snapshot.agent) else {
                let message = format!("Agent not found: {}", snapshot.agent);
                self.with_active(id, |execution| {
                    let step = &mut execution.steps[index];
                    step.status = StepStatus::Failed;
                    step.error = Some(message.clone());
                    step.ended_at = Some(Utc::now());
                })
                .await;
                self.fail_execution(id, &message).await;
                return;
            };

            if self
                .with_active(id, |execution| {
                    let step = &mut execution.steps[index];
                    step.status = StepStatus::Running;
                    step.started_at = Some(Utc::now());
                })
                .await
                .is_none()
            {
                return;
            }

            let payload = json!({
                "action": snapshot.action,
                "workflow_id": id.to_string(),
                "parameters": snapshot.parameters,
                "previous_results": snapshot.previous_results,
            });

            let outcome = tokio::time::timeout(
                Duration::from_secs(snapshot.timeout),
                agent.handle_event(&snapshot.action, payload),
            )
            .await;

            let mut step_result = match outcome {
                Err(_) => {
                    let message = format!("Step timeout after {}s", snapshot.timeout);
                    warn!(
                        workflow_id = %id,
                        step_index = index,
                        agent = %snapshot.agent,
                        timeout = snapshot.timeout,
                        "Step timed out"
                    );
                    self.fail_step(id, index, &message).await;
                    self.fail_execution(id, &message).await;
                    return;
                }
                Ok(Err(e)) => {
                    let message = e.to_string();
                    error!(
                        workflow_id = %id,
                        step_index = index,
                        agent = %snapshot.agent,
                        action = %snapshot.action,
                        error = %message,
                        "Step execution failed"
                    );
                    self.fail_step(id, index, &message).await;
                    self.fail_execution(id, &message).await;
                    return;
                }
                Ok(Ok(value)) => value.unwrap_or(Value::Null),
            };

            if self
                .with_active(id, |execution| {
                    let step = &mut execution.steps[index];
                    step.status = StepStatus::Completed;
                    step.result = Some(step_result.clone());
                    step.ended_at = Some(Utc::now());
                })
                .await
                .is_none()
            {
                return;
            }

            if snapshot.config.qa_validation {
                let context = json!({ "workflow_id": id.to_string(), "step_index": index });
                let report = self
                    .qa
                    .validate_output(&snapshot.agent, &step_result, Some(&context));
                let passed = report.passed;
                let corrected = report.corrected_output.clone();
                let errors = report.errors.clone();
                if self
                    .with_active(id, |execution| execution.qa_reports.push(report))
                    .await
                    .is_none()
                {
                    return;
                }

                if !passed && corrected.is_none() {
                    warn!(
                        workflow_id = %id,
                        step_index = index,
                        errors = ?errors,
                        "QA validation failed for step"
                    );
                    if !snapshot.config.allow_partial_completion {
                        if self
                            .with_active(id, |execution| {
                                let step = &mut execution.steps[index];
                                step.status = StepStatus::Failed;
                                step.error = Some(format!("QA validation failed: {errors:?}"));
                            })
                            .await
                            .is_none()
                        {
                            return;
                        }
                        break;
                    }
                }

                if let Some(corrected_value) = corrected {
                    info!(
                        workflow_id = %id,
                        step_index = index,
                        "Using QA-corrected output for step"
                    );
                    step_result = corrected_value;
                }
            }

            let status_after = match self
                .with_active(id, |execution| {
                    execution.results.insert(
                        format!("step_{index}_{}_{}", snapshot.agent, snapshot.action),
                        step_result,
                    );
                    execution.steps[index].status
                })
                .await
            {
                Some(status) => status,
                None => return,
            };

            if status_after == StepStatus::Failed && !snapshot.config.allow_partial_completion {
                break;
            }
        }

        self.finalize(id).await;
    }

    async fn fail_step(&self, id: Uuid, index: usize, message: &str) {
        self.with_active(id, |execution| {
            let step = &mut execution.steps[index];
            step.status = StepStatus::Failed;
            step.error = Some(message.to_string());
            step.ended_at = Some(Utc::now());
        })
        .await;
    }

    /// Mark the whole execution failed after an execution-fatal step error.
    /// The record stays in the active table; the stuck-workflow sweep
    /// reclaims it once it exceeds its maximum duration.
    async fn fail_execution(&self, id: Uuid, message: &str) {
        let marked = self
            .with_active(id, |execution| {
                execution.status = WorkflowStatus::Failed;
                execution.ended_at = Some(Utc::now());
            })
            .await;
        if marked.is_some() {
            error!(workflow_id = %id, error = %message, "Workflow execution failed");
        }
    }

    /// Final QA pass and the move from the active table to history. Both
    /// locks are held together so the execution is never observable in
    /// neither collection.
    async fn finalize(&self, id: Uuid) {
        let mut active = self.active.write().await;
        let mut history = self.history.write().await;
        let Some(mut execution) = active.remove(&id) else {
            return;
        };
        execution.ended_at = Some(Utc::now());

        let report = self.qa.validate_workflow(&execution);
        let passed = report.passed;
        let completeness = report.completeness;
        let final_errors = report.errors.clone();
        execution.qa_reports.push(report);

        if passed {
            execution.status = WorkflowStatus::Completed;
            info!(
                workflow_id = %id,
                duration = ?execution.duration_secs(),
                completeness = ?completeness,
                "Workflow completed successfully"
            );
        } else {
            execution.status = WorkflowStatus::Failed;
            warn!(
                workflow_id = %id,
                errors = ?final_errors,
                "Workflow completed with QA failures"
            );
        }

        history.push(execution);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_workflow_id_accepts_uuid() {
        let id = Uuid::new_v4();
        let parsed = parse_workflow_id(&json!({ "workflow_id": id.to_string() })).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_workflow_id_rejects_garbage() {
        assert!(parse_workflow_id(&json!({ "workflow_id": "not-a-uuid" })).is_err());
        assert!(parse_workflow_id(&json!({})).is_err());
    }

    #[test]
    fn test_receipt_serialization() {
        let receipt = ExecutionReceipt {
            workflow_id: Uuid::new_v4(),
            status: WorkflowStatus::Pending,
            steps: 3,
        };
        let value = serde_json::to_value(&receipt).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["steps"], 3);
    }

    #[tokio::test]
    async fn test_coordinator_config_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.max_history, 100);
        assert_eq!(config.monitor_interval, Duration::from_secs(30));
        assert_eq!(config.monitor_backoff, Duration::from_secs(60));
    }
}
