use std::sync::Arc;

use cadence_config::{ExecutionConfig, ExecutionMode, GuardrailPolicy};
use cadence_model::{ModelCaller, ModelRequest};
use cadence_queue::PromptQueue;
use tracing::debug;

use crate::context::CallContext;
use crate::error::AgentError;

/// Per-prompt dispatch hints, read and rewritten by middleware.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOptions {
  pub execution_mode: Option<ExecutionMode>,
  pub time_sensitive: bool,
  pub guardrails: Option<GuardrailPolicy>,
}

/// A prompt travelling through the middleware chain.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
  pub prompt: String,
  pub config: ExecutionConfig,
  pub tags: Vec<String>,
  pub options: DispatchOptions,
}

impl PromptRequest {
  pub fn new(prompt: impl Into<String>, config: ExecutionConfig) -> Self {
    Self {
      prompt: prompt.into(),
      config,
      tags: Vec::new(),
      options: DispatchOptions::default(),
    }
  }
}

/// End of the middleware chain.
///
/// `Immediate` prompts call the model directly with a single prompt; every
/// other mode goes through the shared queue.
#[derive(Clone)]
pub struct Dispatcher {
  queue: PromptQueue,
  caller: Arc<dyn ModelCaller>,
}

impl Dispatcher {
  pub fn new(queue: PromptQueue, caller: Arc<dyn ModelCaller>) -> Self {
    Self { queue, caller }
  }

  pub fn queue(&self) -> &PromptQueue {
    &self.queue
  }

  pub async fn dispatch(
    &self,
    request: PromptRequest,
    context: &CallContext,
  ) -> Result<String, AgentError> {
    match request.options.execution_mode {
      Some(ExecutionMode::Immediate) => {
        debug!(step_id = ?context.step_id, model = %request.config.model, "prompt_dispatched_immediate");
        let model_request = ModelRequest::from_prompt(request.prompt, &request.config);
        Ok(self.caller.call(model_request).await?)
      }
      _ => {
        debug!(step_id = ?context.step_id, model = %request.config.model, "prompt_dispatched_batched");
        Ok(
          self
            .queue
            .enqueue(request.prompt, request.tags, request.config)
            .await?,
        )
      }
    }
  }
}
