use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read '{path}'")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {what}")]
  Parse {
    what: &'static str,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid {field}: {message}")]
  Invalid { field: &'static str, message: String },
}

impl ConfigError {
  pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
    Self::Invalid {
      field,
      message: message.into(),
    }
  }
}
