use thiserror::Error;

/// Errors returned by a [`ModelCaller`](crate::ModelCaller).
#[derive(Debug, Error)]
pub enum ModelError {
  /// The request never produced an HTTP response.
  #[error("model request failed: {0}")]
  Transport(#[source] reqwest::Error),

  #[error("model request timed out")]
  Timeout,

  /// The provider answered with a non-success status.
  #[error("model provider returned {status}: {body}")]
  Status { status: u16, body: String },

  /// The provider answered but the body was not usable.
  #[error("invalid model response: {message}")]
  InvalidResponse { message: String },

  #[error("model caller misconfigured: {message}")]
  Config { message: String },
}

impl ModelError {
  pub fn invalid_response(message: impl Into<String>) -> Self {
    Self::InvalidResponse {
      message: message.into(),
    }
  }
}

impl From<reqwest::Error> for ModelError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      ModelError::Timeout
    } else {
      ModelError::Transport(e)
    }
  }
}
