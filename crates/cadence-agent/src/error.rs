use cadence_guardrails::Violation;
use cadence_model::ModelError;
use cadence_queue::QueueError;
use thiserror::Error;

use crate::result::FailureKind;

#[derive(Debug, Error)]
pub enum AgentError {
  /// The prompt was rejected before reaching the model.
  #[error("prompt rejected by guardrails: {}", describe(.violations))]
  GuardrailRejected { violations: Vec<Violation> },

  #[error(transparent)]
  Queue(#[from] QueueError),

  #[error(transparent)]
  Upstream(#[from] ModelError),

  #[error("unknown agent '{agent_id}'")]
  UnknownAgent { agent_id: String },

  #[error("agent '{agent_id}' does not support action '{action}'")]
  UnsupportedAction { agent_id: String, action: String },

  /// The model answered but nothing usable could be extracted.
  #[error("unusable model response: {message}")]
  ResponseShape { message: String },
}

fn describe(violations: &[Violation]) -> String {
  violations
    .iter()
    .map(|v| v.message.as_str())
    .collect::<Vec<_>>()
    .join("; ")
}

impl AgentError {
  pub fn response_shape(message: impl Into<String>) -> Self {
    Self::ResponseShape {
      message: message.into(),
    }
  }

  pub fn failure_kind(&self) -> FailureKind {
    match self {
      AgentError::GuardrailRejected { .. } => FailureKind::GuardrailRejected,
      AgentError::Queue(QueueError::Cancelled) => FailureKind::Cancelled,
      AgentError::Queue(_) | AgentError::Upstream(_) => FailureKind::Upstream,
      AgentError::UnknownAgent { .. } => FailureKind::UnknownAgent,
      AgentError::UnsupportedAction { .. } => FailureKind::UnsupportedAction,
      AgentError::ResponseShape { .. } => FailureKind::ResponseShape,
    }
  }
}
