use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::AgentDef;
use crate::enums::ExecutionMode;
use crate::error::ConfigError;

/// Top-level runtime configuration. `{}` is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CadenceConfig {
  #[serde(default)]
  pub queue: QueueConfig,
  #[serde(default)]
  pub dispatch: DispatchConfig,
  #[serde(default)]
  pub engine: EngineConfig,
  #[serde(default)]
  pub model: ModelEndpointConfig,
  /// Agents to register. Empty means the builtin specialists.
  #[serde(default)]
  pub agents: Vec<AgentDef>,
}

impl CadenceConfig {
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    let config: Self = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
      what: "cadence config",
      source,
    })?;
    config.queue.validate()?;
    Ok(config)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.display().to_string(),
      source,
    })?;
    Self::from_json(&content)
  }
}

/// Prompt queue batching policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
  #[serde(default = "default_min_batch_size")]
  pub min_batch_size: usize,
  #[serde(default = "default_max_batch_size")]
  pub max_batch_size: usize,
  #[serde(default = "default_max_batch_wait_ms")]
  pub max_batch_wait_ms: u64,
  /// Forced flush for a queue that never reaches `min_batch_size`.
  /// `None` disables it.
  #[serde(default = "default_straggler_timeout_ms")]
  pub straggler_timeout_ms: Option<u64>,
}

fn default_min_batch_size() -> usize {
  2
}

fn default_max_batch_size() -> usize {
  10
}

fn default_max_batch_wait_ms() -> u64 {
  2_000
}

fn default_straggler_timeout_ms() -> Option<u64> {
  Some(default_max_batch_wait_ms())
}

impl Default for QueueConfig {
  fn default() -> Self {
    Self {
      min_batch_size: default_min_batch_size(),
      max_batch_size: default_max_batch_size(),
      max_batch_wait_ms: default_max_batch_wait_ms(),
      straggler_timeout_ms: default_straggler_timeout_ms(),
    }
  }
}

impl QueueConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.min_batch_size == 0 {
      return Err(ConfigError::invalid(
        "queue.min_batch_size",
        "must be at least 1",
      ));
    }
    if self.min_batch_size > self.max_batch_size {
      return Err(ConfigError::invalid(
        "queue.min_batch_size",
        format!(
          "{} exceeds max_batch_size {}",
          self.min_batch_size, self.max_batch_size
        ),
      ));
    }
    Ok(())
  }

  pub fn max_batch_wait(&self) -> Duration {
    Duration::from_millis(self.max_batch_wait_ms)
  }

  pub fn straggler_timeout(&self) -> Option<Duration> {
    self.straggler_timeout_ms.map(Duration::from_millis)
  }
}

/// Execution-mode selection for the dispatch middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
  /// Prompts at least this many characters long go out immediately in auto mode.
  #[serde(default = "default_long_prompt_threshold")]
  pub long_prompt_threshold: usize,
  #[serde(default)]
  pub default_mode: ExecutionMode,
}

fn default_long_prompt_threshold() -> usize {
  4_000
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      long_prompt_threshold: default_long_prompt_threshold(),
      default_mode: ExecutionMode::Auto,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
  /// Applied to steps without their own `timeout_ms`. `None` means no limit.
  #[serde(default = "default_step_timeout_ms")]
  pub step_timeout_ms: Option<u64>,
}

fn default_step_timeout_ms() -> Option<u64> {
  Some(120_000)
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      step_timeout_ms: default_step_timeout_ms(),
    }
  }
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEndpointConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Name of the environment variable holding the API key.
  #[serde(default = "default_api_key_env")]
  pub api_key_env: String,
  #[serde(default = "default_model")]
  pub default_model: String,
  #[serde(default = "default_request_timeout_ms")]
  pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
  "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
  "CADENCE_API_KEY".to_string()
}

fn default_model() -> String {
  "gpt-4o-mini".to_string()
}

fn default_request_timeout_ms() -> u64 {
  60_000
}

impl Default for ModelEndpointConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      api_key_env: default_api_key_env(),
      default_model: default_model(),
      request_timeout_ms: default_request_timeout_ms(),
    }
  }
}
