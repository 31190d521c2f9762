use cadence_agent::AgentError;
use cadence_workflow::WorkflowError;
use thiserror::Error;

/// Structural and internal failures. A step failing is not an engine
/// error; it is reported in the [`WorkflowResult`](crate::WorkflowResult).
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("invalid workflow: {0}")]
  InvalidWorkflow(#[from] WorkflowError),

  /// A step targets an agent or action that is not registered.
  #[error("step '{step_id}' cannot run: {source}")]
  Unroutable {
    step_id: String,
    #[source]
    source: AgentError,
  },

  #[error("no step can make progress, still pending: {}", .pending.join(", "))]
  NoProgress { pending: Vec<String> },

  #[error("unknown step '{0}'")]
  UnknownStep(String),

  #[error("cannot resume from step {index}, workflow has {len} steps")]
  InvalidResumePoint { index: usize, len: usize },

  #[error("context belongs to workflow '{found}', not '{expected}'")]
  ContextMismatch { expected: String, found: String },

  #[error("step '{step_id}' task failed: {message}")]
  TaskJoin { step_id: String, message: String },
}
