use serde::{Deserialize, Serialize};

/// Model settings for a single prompt.
///
/// Two prompts can share an upstream call only when their configs are equal,
/// including the system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
  /// Model identifier, e.g. "gpt-4o-mini"
  pub model: String,
  #[serde(default = "default_temperature")]
  pub temperature: f32,
  /// Ask the model for a machine-parseable (JSON object) response.
  #[serde(default)]
  pub structured_output: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub system_prompt: Option<String>,
}

fn default_temperature() -> f32 {
  0.7
}

impl ExecutionConfig {
  pub fn new(model: impl Into<String>) -> Self {
    Self {
      model: model.into(),
      temperature: default_temperature(),
      structured_output: false,
      system_prompt: None,
    }
  }

  pub fn with_temperature(mut self, temperature: f32) -> Self {
    self.temperature = temperature;
    self
  }

  pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
    self.system_prompt = Some(system_prompt.into());
    self
  }

  pub fn structured(mut self, structured_output: bool) -> Self {
    self.structured_output = structured_output;
    self
  }
}
