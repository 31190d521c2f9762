use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::enums::ExecutionMode;
use crate::error::ConfigError;
use crate::guardrails::GuardrailPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub workflow_id: String,
  pub name: String,
  /// Declaration order. Execution order comes from `depends_on`.
  pub steps: Vec<StepDef>,
  #[serde(default = "default_max_parallel")]
  pub max_parallel: usize,
  /// Policy applied to the output of content-producing steps.
  #[serde(default)]
  pub guardrails: GuardrailPolicy,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

fn default_max_parallel() -> usize {
  3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
  pub step_id: String,
  pub agent_id: String,
  #[serde(default)]
  pub name: String,
  /// Action the agent should perform, e.g. "draft" or "research".
  pub action: String,
  /// Prompt template. Supports `{{<step_id>.result}}`, `{{userId}}`,
  /// `{{sessionId}}` and `{{input.<path>}}`.
  #[serde(default)]
  pub prompt: String,
  #[serde(default)]
  pub depends_on: Vec<String>,
  /// A failed optional step never fails the workflow.
  #[serde(default)]
  pub optional: bool,
  #[serde(default)]
  pub overrides: StepOverrides,
  /// Agent-specific parameters, passed through untouched.
  #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
  pub params: serde_json::Map<String, serde_json::Value>,
}

impl StepDef {
  /// Display name, falling back to the step id.
  pub fn display_name(&self) -> &str {
    if self.name.is_empty() {
      &self.step_id
    } else {
      &self.name
    }
  }
}

/// Per-step execution overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOverrides {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub temperature: Option<f32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub structured_output: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub execution_mode: Option<ExecutionMode>,
  #[serde(default)]
  pub time_sensitive: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

impl WorkflowDef {
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    serde_json::from_str(json).map_err(|source| ConfigError::Parse {
      what: "workflow definition",
      source,
    })
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.display().to_string(),
      source,
    })?;
    Self::from_json(&content)
  }

  /// Get a step by ID.
  pub fn get_step(&self, step_id: &str) -> Option<&StepDef> {
    self.steps.iter().find(|s| s.step_id == step_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_minimal_workflow() {
    let json = r#"{
      "workflow_id": "wf-1",
      "name": "Blog post",
      "steps": [
        { "step_id": "research", "agent_id": "research", "action": "research",
          "prompt": "Find facts about {{input.topic}}" }
      ]
    }"#;
    let wf = WorkflowDef::from_json(json).unwrap();
    assert_eq!(wf.workflow_id, "wf-1");
    assert_eq!(wf.max_parallel, 3);
    assert!(wf.guardrails.is_empty());
    assert_eq!(wf.steps.len(), 1);
    assert!(wf.steps[0].depends_on.is_empty());
    assert!(!wf.steps[0].optional);
    assert_eq!(wf.steps[0].display_name(), "research");
  }

  #[test]
  fn test_parse_full_step() {
    let json = r#"{
      "workflow_id": "wf-2",
      "name": "Campaign",
      "max_parallel": 2,
      "timeout_ms": 60000,
      "guardrails": { "max_length": 280, "require_approval": true },
      "steps": [
        { "step_id": "draft", "agent_id": "writer", "name": "Write draft",
          "action": "draft", "depends_on": ["research"], "optional": true,
          "overrides": { "model": "gpt-4o", "temperature": 0.2,
                         "execution_mode": "immediate", "timeout_ms": 5000 },
          "params": { "tone": "friendly" } }
      ]
    }"#;
    let wf = WorkflowDef::from_json(json).unwrap();
    let step = wf.get_step("draft").unwrap();
    assert_eq!(step.display_name(), "Write draft");
    assert!(step.optional);
    assert_eq!(step.overrides.model.as_deref(), Some("gpt-4o"));
    assert_eq!(step.overrides.temperature, Some(0.2));
    assert_eq!(
      step.overrides.execution_mode,
      Some(ExecutionMode::Immediate)
    );
    assert_eq!(step.params["tone"], "friendly");
    assert_eq!(wf.guardrails.max_length, Some(280));
    assert!(wf.guardrails.require_approval);
  }

  #[test]
  fn test_parse_error_is_reported() {
    let err = WorkflowDef::from_json("{ \"name\": 1 }").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
  }
}
