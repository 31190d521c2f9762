//! Prompt middleware chain.

use std::sync::Arc;

use async_trait::async_trait;
use cadence_config::{DispatchConfig, GuardrailPolicy};
use cadence_guardrails::{CheckContext, GuardrailsChecker};
use tracing::{debug, warn};

use crate::context::CallContext;
use crate::dispatch::{Dispatcher, PromptRequest};
use crate::error::AgentError;
use crate::mode::select_execution_mode;

/// Intercepts a prompt on its way to the model.
///
/// A middleware may rewrite the request, answer it without calling `next`
/// (short-circuit), or delegate with `next.run(...)`.
#[async_trait]
pub trait Middleware: Send + Sync {
  async fn handle(
    &self,
    request: PromptRequest,
    context: &CallContext,
    next: Next<'_>,
  ) -> Result<String, AgentError>;
}

/// The rest of the chain after the current middleware.
pub struct Next<'a> {
  chain: &'a [Arc<dyn Middleware>],
  dispatcher: &'a Dispatcher,
}

impl<'a> Next<'a> {
  pub async fn run(self, request: PromptRequest, context: &CallContext) -> Result<String, AgentError> {
    match self.chain.split_first() {
      Some((head, rest)) => {
        let next = Next {
          chain: rest,
          dispatcher: self.dispatcher,
        };
        head.handle(request, context, next).await
      }
      None => self.dispatcher.dispatch(request, context).await,
    }
  }
}

/// Ordered middleware ending in a [`Dispatcher`].
pub struct Pipeline {
  middleware: Vec<Arc<dyn Middleware>>,
  dispatcher: Dispatcher,
}

impl Pipeline {
  /// A pipeline with no middleware; prompts go straight to the dispatcher.
  pub fn new(dispatcher: Dispatcher) -> Self {
    Self {
      middleware: Vec::new(),
      dispatcher,
    }
  }

  /// Guardrails, then workflow context, then execution-mode selection.
  pub fn with_defaults(
    dispatcher: Dispatcher,
    checker: Arc<dyn GuardrailsChecker>,
    dispatch: DispatchConfig,
  ) -> Self {
    Self::new(dispatcher)
      .layer(GuardrailsMiddleware::new(checker))
      .layer(WorkflowContextMiddleware)
      .layer(ExecutionModeMiddleware::new(dispatch))
  }

  /// Append a middleware. Earlier layers run first.
  pub fn layer(mut self, middleware: impl Middleware + 'static) -> Self {
    self.middleware.push(Arc::new(middleware));
    self
  }

  pub fn dispatcher(&self) -> &Dispatcher {
    &self.dispatcher
  }

  pub async fn run(&self, request: PromptRequest, context: &CallContext) -> Result<String, AgentError> {
    Next {
      chain: &self.middleware,
      dispatcher: &self.dispatcher,
    }
    .run(request, context)
    .await
  }
}

/// Rejects prompts containing forbidden phrases before any model call.
///
/// Only the forbidden-phrase rules apply to prompts; length and
/// required-phrase rules are about generated output.
pub struct GuardrailsMiddleware {
  checker: Arc<dyn GuardrailsChecker>,
}

impl GuardrailsMiddleware {
  pub fn new(checker: Arc<dyn GuardrailsChecker>) -> Self {
    Self { checker }
  }
}

#[async_trait]
impl Middleware for GuardrailsMiddleware {
  async fn handle(
    &self,
    request: PromptRequest,
    context: &CallContext,
    next: Next<'_>,
  ) -> Result<String, AgentError> {
    let Some(policy) = request.options.guardrails.clone() else {
      return next.run(request, context).await;
    };

    let prompt_policy = GuardrailPolicy {
      forbidden_phrases: policy.forbidden_phrases.clone(),
      ..Default::default()
    };
    let check_context = CheckContext {
      user_id: context.user_id.clone(),
      session_id: context.session_id.clone(),
      step_id: context.step_id.clone(),
    };
    let report = self.checker.check(&request.prompt, &prompt_policy, &check_context);

    if !report.passed {
      warn!(
        step_id = ?context.step_id,
        violations = %report.describe(),
        "prompt_rejected"
      );
      return Err(AgentError::GuardrailRejected {
        violations: report.violations,
      });
    }

    next.run(request, context).await
  }
}

/// Tags prompts with the workflow, execution, step and user they serve.
pub struct WorkflowContextMiddleware;

#[async_trait]
impl Middleware for WorkflowContextMiddleware {
  async fn handle(
    &self,
    mut request: PromptRequest,
    context: &CallContext,
    next: Next<'_>,
  ) -> Result<String, AgentError> {
    let annotations = [
      ("workflow", context.workflow_id.as_deref()),
      ("execution", context.execution_id.as_deref()),
      ("step", context.step_id.as_deref()),
      ("user", Some(context.user_id.as_str()).filter(|u| !u.is_empty())),
    ];
    for (key, value) in annotations {
      if let Some(value) = value {
        request.tags.push(format!("{}:{}", key, value));
      }
    }

    next.run(request, context).await
  }
}

/// Replaces `Auto` (or no mode) with a concrete mode.
pub struct ExecutionModeMiddleware {
  config: DispatchConfig,
}

impl ExecutionModeMiddleware {
  pub fn new(config: DispatchConfig) -> Self {
    Self { config }
  }
}

#[async_trait]
impl Middleware for ExecutionModeMiddleware {
  async fn handle(
    &self,
    mut request: PromptRequest,
    context: &CallContext,
    next: Next<'_>,
  ) -> Result<String, AgentError> {
    let mode = select_execution_mode(
      request.options.execution_mode,
      request.prompt.chars().count(),
      request.options.time_sensitive,
      &self.config,
    );
    debug!(step_id = ?context.step_id, ?mode, "execution_mode_selected");
    request.options.execution_mode = Some(mode);

    next.run(request, context).await
  }
}
