use serde::{Deserialize, Serialize};

/// How a prompt reaches the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
  /// Call the model directly, bypassing the prompt queue.
  Immediate,
  /// Go through the prompt queue and share an upstream call with others.
  Batched,
  /// Let the dispatcher pick based on prompt length and urgency.
  #[default]
  Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
  Research,
  Writer,
  Editor,
  Scheduler,
  Generic,
}

impl AgentKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      AgentKind::Research => "research",
      AgentKind::Writer => "writer",
      AgentKind::Editor => "editor",
      AgentKind::Scheduler => "scheduler",
      AgentKind::Generic => "generic",
    }
  }
}

impl std::fmt::Display for AgentKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}
