use serde::{Deserialize, Serialize};

use crate::enums::AgentKind;

/// Wiring for one agent in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDef {
  pub agent_id: String,
  pub kind: AgentKind,
  /// Supported actions. Empty means the kind's default action set.
  #[serde(default)]
  pub actions: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub system_prompt: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub temperature: Option<f32>,
}

impl AgentDef {
  pub fn new(agent_id: impl Into<String>, kind: AgentKind) -> Self {
    Self {
      agent_id: agent_id.into(),
      kind,
      actions: Vec::new(),
      system_prompt: None,
      model: None,
      temperature: None,
    }
  }
}

/// One agent per specialist kind, keyed by the kind name.
pub fn builtin_agents() -> Vec<AgentDef> {
  [
    AgentKind::Research,
    AgentKind::Writer,
    AgentKind::Editor,
    AgentKind::Scheduler,
  ]
  .into_iter()
  .map(|kind| AgentDef::new(kind.as_str(), kind))
  .collect()
}
