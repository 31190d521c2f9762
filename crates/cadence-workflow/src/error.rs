use thiserror::Error;

/// Structural problems with a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error("workflow has no steps")]
  EmptyWorkflow,

  #[error("max_parallel must be at least 1")]
  InvalidParallelism,

  #[error("step '{step_id}' is invalid: {message}")]
  InvalidStep { step_id: String, message: String },

  #[error("duplicate step id: {0}")]
  DuplicateStep(String),

  #[error("step '{step_id}' depends on unknown step '{dependency}'")]
  UnknownDependency { step_id: String, dependency: String },

  #[error("dependency cycle detected: {}", .path.join(" -> "))]
  CycleDetected { path: Vec<String> },
}
