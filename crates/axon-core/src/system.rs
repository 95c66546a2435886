use crate::agent::{Agent, AgentInfo};
use crate::AxonResult;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Name-based agent registry and event dispatch bus.
///
/// Constructed once at startup and shared by `Arc` with every component
/// that needs agent lookup. Agents are registered during initialization
/// and never removed at runtime; the interior lock exists so registration
/// can happen after the system has been handed out (the coordinator is
/// itself an agent that holds a reference back to the system).
pub struct AgentSystem {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentSystem {
    /// Create an empty system.
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Register an agent under its own name. Replaces any previous
    /// registration with the same name.
    pub fn register(&self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        debug!(agent = %name, "Registered agent");
        self.agents.write().insert(name, agent);
    }

    /// Look up an agent by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().get(name).cloned()
    }

    /// Registered agent names, sorted for stable output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered agents.
    pub fn agent_count(&self) -> usize {
        self.agents.read().len()
    }

    /// Send an event to a single agent by name.
    ///
    /// A missing target is not an error for the caller: a warning is
    /// logged and `Ok(None)` is returned. An agent without a handler for
    /// `event_type` likewise yields `Ok(None)`, silently. Errors raised by
    /// the handler itself propagate unchanged.
    pub async fn send(
        &self,
        target: &str,
        event_type: &str,
        payload: Value,
    ) -> AxonResult<Option<Value>> {
        let agent = match self.get(target) {
            Some(agent) => agent,
            None => {
                warn!(target = %target, event_type = %event_type, "Target agent not found");
                return Ok(None);
            }
        };
        debug!(target = %target, event_type = %event_type, "Sending event");
        agent.handle_event(event_type, payload).await
    }

    /// Broadcast an event to every agent, sequentially.
    ///
    /// A per-target handler error is caught and recorded as
    /// `{"error": message}` for that target only; it never aborts the
    /// broadcast. Pass the sender's name as `exclude` to skip it.
    pub async fn broadcast(
        &self,
        event_type: &str,
        payload: &Value,
        exclude: Option<&str>,
    ) -> HashMap<String, Value> {
        let targets: Vec<(String, Arc<dyn Agent>)> = {
            let agents = self.agents.read();
            let mut targets: Vec<(String, Arc<dyn Agent>)> = agents
                .iter()
                .filter(|(name, _)| Some(name.as_str()) != exclude)
                .map(|(name, agent)| (name.clone(), agent.clone()))
                .collect();
            targets.sort_by(|a, b| a.0.cmp(&b.0));
            targets
        };

        let mut results = HashMap::new();
        for (name, agent) in targets {
            match agent.handle_event(event_type, payload.clone()).await {
                Ok(Some(value)) => {
                    results.insert(name, value);
                }
                Ok(None) => {
                    results.insert(name, Value::Null);
                }
                Err(e) => {
                    error!(target = %name, event_type = %event_type, error = %e, "Broadcast event failed");
                    results.insert(name, serde_json::json!({ "error": e.to_string() }));
                }
            }
        }
        results
    }

    /// Descriptive metadata for every registered agent, sorted by name.
    pub fn health_report(&self) -> Vec<AgentInfo> {
        let mut infos: Vec<AgentInfo> =
            self.agents.read().values().map(|a| a.info()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

impl Default for AgentSystem {
    fn default() -> Self {
        Self::new()
    }
}
