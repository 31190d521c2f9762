use cadence_config::{GuardrailPolicy, StepOverrides};
use serde::{Deserialize, Serialize};

/// Who is asking, and on behalf of which workflow step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
  pub user_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub session_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workflow_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub execution_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub step_id: Option<String>,
}

impl CallContext {
  pub fn new(user_id: impl Into<String>) -> Self {
    Self {
      user_id: user_id.into(),
      ..Default::default()
    }
  }

  pub fn with_session(mut self, session_id: Option<String>) -> Self {
    self.session_id = session_id;
    self
  }

  pub fn for_step(
    &self,
    workflow_id: impl Into<String>,
    execution_id: impl Into<String>,
    step_id: impl Into<String>,
  ) -> Self {
    Self {
      workflow_id: Some(workflow_id.into()),
      execution_id: Some(execution_id.into()),
      step_id: Some(step_id.into()),
      ..self.clone()
    }
  }
}

/// Inputs for one agent action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentParams {
  /// Prompt with every template token already resolved.
  pub prompt: String,
  pub overrides: StepOverrides,
  /// Policy the prompt is screened against before dispatch.
  pub guardrails: Option<GuardrailPolicy>,
  /// Agent-specific extras from the step definition.
  pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AgentParams {
  pub fn new(prompt: impl Into<String>) -> Self {
    Self {
      prompt: prompt.into(),
      ..Default::default()
    }
  }
}
