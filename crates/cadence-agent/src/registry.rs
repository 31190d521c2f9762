use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use cadence_config::AgentDef;
use tracing::{debug, instrument};

use crate::agent::Agent;
use crate::context::{AgentParams, CallContext};
use crate::error::AgentError;
use crate::middleware::Pipeline;
use crate::result::StepResult;
use crate::specialist::SpecialistAgent;

/// Agents keyed by id. Constructed explicitly and shared by `Arc`.
#[derive(Default)]
pub struct AgentRegistry {
  agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// One [`SpecialistAgent`] per definition, all sharing `pipeline`.
  pub fn from_defs(defs: &[AgentDef], pipeline: Arc<Pipeline>, default_model: &str) -> Self {
    let registry = Self::new();
    for def in defs {
      registry.register(Arc::new(SpecialistAgent::new(
        def.clone(),
        Arc::clone(&pipeline),
        default_model,
      )));
    }
    registry
  }

  /// Register an agent, returning the one it replaced.
  pub fn register(&self, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
    let id = agent.id().to_string();
    debug!(agent_id = %id, kind = %agent.kind(), "agent_registered");
    let mut agents = self.agents.write().unwrap_or_else(|e| e.into_inner());
    agents.insert(id, agent)
  }

  pub fn unregister(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
    let mut agents = self.agents.write().unwrap_or_else(|e| e.into_inner());
    agents.remove(agent_id)
  }

  pub fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
    let agents = self.agents.read().unwrap_or_else(|e| e.into_inner());
    agents.get(agent_id).cloned()
  }

  pub fn contains(&self, agent_id: &str) -> bool {
    let agents = self.agents.read().unwrap_or_else(|e| e.into_inner());
    agents.contains_key(agent_id)
  }

  /// Registered ids, sorted.
  pub fn ids(&self) -> Vec<String> {
    let agents = self.agents.read().unwrap_or_else(|e| e.into_inner());
    let mut ids: Vec<String> = agents.keys().cloned().collect();
    ids.sort();
    ids
  }

  /// Look up an agent that supports `action`.
  pub fn resolve(&self, agent_id: &str, action: &str) -> Result<Arc<dyn Agent>, AgentError> {
    let agent = self.get(agent_id).ok_or_else(|| AgentError::UnknownAgent {
      agent_id: agent_id.to_string(),
    })?;
    if !agent.supports_action(action) {
      return Err(AgentError::UnsupportedAction {
        agent_id: agent_id.to_string(),
        action: action.to_string(),
      });
    }
    Ok(agent)
  }

  /// Run `action` on an agent. Lookup failures come back as failed results.
  #[instrument(name = "agent_execute", skip(self, context, params), fields(step_id = ?context.step_id))]
  pub async fn execute(
    &self,
    agent_id: &str,
    action: &str,
    context: &CallContext,
    params: &AgentParams,
  ) -> StepResult {
    match self.resolve(agent_id, action) {
      Ok(agent) => agent.execute(action, context, params).await,
      Err(e) => StepResult::from_error(&e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::StepOutput;
  use crate::result::FailureKind;
  use async_trait::async_trait;
  use cadence_config::AgentKind;

  struct EchoAgent {
    id: String,
  }

  #[async_trait]
  impl Agent for EchoAgent {
    fn id(&self) -> &str {
      &self.id
    }

    fn kind(&self) -> AgentKind {
      AgentKind::Generic
    }

    fn supports_action(&self, action: &str) -> bool {
      action == "echo"
    }

    async fn execute(&self, _action: &str, _context: &CallContext, params: &AgentParams) -> StepResult {
      StepResult::succeeded(StepOutput::Text(params.prompt.clone()))
    }
  }

  fn echo(id: &str) -> Arc<dyn Agent> {
    Arc::new(EchoAgent { id: id.to_string() })
  }

  #[test]
  fn test_register_and_unregister() {
    let registry = AgentRegistry::new();
    assert!(registry.register(echo("b")).is_none());
    assert!(registry.register(echo("a")).is_none());
    assert!(registry.register(echo("a")).is_some());
    assert_eq!(registry.ids(), vec!["a", "b"]);

    assert!(registry.unregister("a").is_some());
    assert!(!registry.contains("a"));
    assert!(registry.get("b").is_some());
  }

  #[tokio::test]
  async fn test_execute_known_agent() {
    let registry = AgentRegistry::new();
    registry.register(echo("e"));

    let result = registry
      .execute("e", "echo", &CallContext::new("u"), &AgentParams::new("hello"))
      .await;
    assert_eq!(result.output(), Some(&StepOutput::Text("hello".to_string())));
  }

  #[tokio::test]
  async fn test_unknown_agent_is_failed_result() {
    let registry = AgentRegistry::new();
    let result = registry
      .execute("ghost", "echo", &CallContext::new("u"), &AgentParams::default())
      .await;
    assert_eq!(result.error().unwrap().kind, FailureKind::UnknownAgent);
  }

  #[tokio::test]
  async fn test_unsupported_action_is_failed_result() {
    let registry = AgentRegistry::new();
    registry.register(echo("e"));
    let result = registry
      .execute("e", "shout", &CallContext::new("u"), &AgentParams::default())
      .await;
    assert_eq!(result.error().unwrap().kind, FailureKind::UnsupportedAction);
    assert!(matches!(
      registry.resolve("e", "shout"),
      Err(AgentError::UnsupportedAction { .. })
    ));
  }
}
