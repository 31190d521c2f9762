use cadence_config::{DispatchConfig, ExecutionMode};

/// Pick a concrete mode for a prompt.
///
/// An explicit `Immediate` or `Batched` wins. `Auto` (explicit or as the
/// configured default) goes immediate for time-sensitive prompts and for
/// prompts of at least `long_prompt_threshold` characters, batched otherwise.
pub fn select_execution_mode(
  explicit: Option<ExecutionMode>,
  prompt_len: usize,
  time_sensitive: bool,
  config: &DispatchConfig,
) -> ExecutionMode {
  match explicit.unwrap_or(config.default_mode) {
    ExecutionMode::Auto => {
      if time_sensitive || prompt_len >= config.long_prompt_threshold {
        ExecutionMode::Immediate
      } else {
        ExecutionMode::Batched
      }
    }
    mode => mode,
  }
}
