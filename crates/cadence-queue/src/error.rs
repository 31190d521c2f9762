use std::sync::Arc;

use cadence_model::ModelError;
use thiserror::Error;

/// Failure delivered to a queued prompt.
///
/// Cloneable: one failed upstream call rejects every prompt of its group
/// with the same error.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
  #[error("upstream model call failed: {source}")]
  Upstream {
    #[source]
    source: Arc<ModelError>,
  },

  /// The batch could not be executed at all, e.g. the caller task panicked.
  #[error("batch execution failed: {message}")]
  BatchExecution { message: String },

  #[error("prompt cancelled before its batch executed")]
  Cancelled,
}

impl From<ModelError> for QueueError {
  fn from(e: ModelError) -> Self {
    QueueError::Upstream {
      source: Arc::new(e),
    }
  }
}
