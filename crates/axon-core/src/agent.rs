use crate::AxonResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The uniform contract every addressable component implements.
///
/// An agent exposes a fixed set of named actions through a single entry
/// point: [`Agent::handle_event`]. Dispatch is purely name-based — the
/// [`AgentSystem`](crate::AgentSystem) looks agents up by [`Agent::name`]
/// and forwards `(event_type, payload)` pairs. Capabilities are descriptive
/// metadata only; they are surfaced in health reports and never consulted
/// for routing.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The unique name this agent is registered under.
    fn name(&self) -> &str;

    /// Capabilities this agent advertises. Informational, not enforced.
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the agent is accepting events. Defaults to `true`; agents
    /// with a startup or shutdown phase can override.
    fn is_running(&self) -> bool {
        true
    }

    /// Handle an event sent to this agent.
    ///
    /// Returns `Ok(None)` when no handler is registered for `event_type` —
    /// a normal outcome used by agents that implement only a subset of
    /// possible actions. Errors raised by a handler propagate to the
    /// direct caller.
    async fn handle_event(&self, event_type: &str, payload: Value) -> AxonResult<Option<Value>>;

    /// Descriptive metadata for health reports.
    fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name().to_string(),
            running: self.is_running(),
            capabilities: self.capabilities(),
        }
    }
}

/// Descriptive agent metadata surfaced in health reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Registered agent name.
    pub name: String,
    /// Whether the agent reports itself as running.
    pub running: bool,
    /// Advertised capabilities (informational only).
    pub capabilities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullAgent;

    #[async_trait]
    impl Agent for NullAgent {
        fn name(&self) -> &str {
            "null"
        }

        async fn handle_event(
            &self,
            _event_type: &str,
            _payload: Value,
        ) -> AxonResult<Option<Value>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_default_info() {
        let agent = NullAgent;
        let info = agent.info();
        assert_eq!(info.name, "null");
        assert!(info.running);
        assert!(info.capabilities.is_empty());
    }

    #[tokio::test]
    async fn test_unhandled_event_is_absent() {
        let agent = NullAgent;
        let result = agent
            .handle_event("anything", Value::Null)
            .await
            .expect("handler should not error");
        assert!(result.is_none());
    }
}
