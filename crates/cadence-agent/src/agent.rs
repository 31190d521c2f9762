use async_trait::async_trait;
use cadence_config::AgentKind;

use crate::context::{AgentParams, CallContext};
use crate::result::StepResult;

/// A unit of work a workflow step can target.
///
/// `execute` never returns an error: every failure is a failed
/// [`StepResult`] so one misbehaving agent cannot take down a workflow.
#[async_trait]
pub trait Agent: Send + Sync {
  fn id(&self) -> &str;

  fn kind(&self) -> AgentKind;

  fn supports_action(&self, action: &str) -> bool;

  /// Whether output of `action` is content that guardrails should check.
  fn produces_content(&self, _action: &str) -> bool {
    false
  }

  async fn execute(&self, action: &str, context: &CallContext, params: &AgentParams) -> StepResult;
}
