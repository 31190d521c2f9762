use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::output::StepOutput;

/// Why a step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  UnknownAgent,
  UnsupportedAction,
  GuardrailRejected,
  Upstream,
  ResponseShape,
  Timeout,
  Cancelled,
  Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
  pub kind: FailureKind,
  pub message: String,
}

impl std::fmt::Display for StepFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.message)
  }
}

/// Success carries an output, failure carries an error. Never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
  Succeeded { output: StepOutput },
  Failed { error: StepFailure },
}

/// Result of one agent action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
  #[serde(flatten)]
  pub outcome: StepOutcome,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<String>,
  #[serde(default)]
  pub duration_ms: u64,
}

impl StepResult {
  pub fn succeeded(output: StepOutput) -> Self {
    Self {
      outcome: StepOutcome::Succeeded { output },
      warnings: Vec::new(),
      duration_ms: 0,
    }
  }

  pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
    Self {
      outcome: StepOutcome::Failed {
        error: StepFailure {
          kind,
          message: message.into(),
        },
      },
      warnings: Vec::new(),
      duration_ms: 0,
    }
  }

  pub fn from_error(error: &AgentError) -> Self {
    Self::failed(error.failure_kind(), error.to_string())
  }

  pub fn with_duration(mut self, duration_ms: u64) -> Self {
    self.duration_ms = duration_ms;
    self
  }

  pub fn is_success(&self) -> bool {
    matches!(self.outcome, StepOutcome::Succeeded { .. })
  }

  pub fn output(&self) -> Option<&StepOutput> {
    match &self.outcome {
      StepOutcome::Succeeded { output } => Some(output),
      StepOutcome::Failed { .. } => None,
    }
  }

  pub fn error(&self) -> Option<&StepFailure> {
    match &self.outcome {
      StepOutcome::Succeeded { .. } => None,
      StepOutcome::Failed { error } => Some(error),
    }
  }
}

impl From<Result<StepOutput, AgentError>> for StepResult {
  fn from(result: Result<StepOutput, AgentError>) -> Self {
    match result {
      Ok(output) => StepResult::succeeded(output),
      Err(e) => StepResult::from_error(&e),
    }
  }
}
