//! LLM-backed agents for each [`AgentKind`].

use std::sync::Arc;

use async_trait::async_trait;
use cadence_config::{AgentDef, AgentKind, ExecutionConfig, StepOverrides};
use tracing::debug;

use crate::agent::Agent;
use crate::context::{AgentParams, CallContext};
use crate::dispatch::{DispatchOptions, PromptRequest};
use crate::error::AgentError;
use crate::middleware::Pipeline;
use crate::output::{DraftContent, ResearchNotes, ScheduleRecord, StepOutput};
use crate::result::StepResult;

/// An agent that sends its prompts through a shared [`Pipeline`] and parses
/// the answer into the output type of its kind.
pub struct SpecialistAgent {
  def: AgentDef,
  pipeline: Arc<Pipeline>,
  default_model: String,
}

impl SpecialistAgent {
  pub fn new(def: AgentDef, pipeline: Arc<Pipeline>, default_model: impl Into<String>) -> Self {
    Self {
      def,
      pipeline,
      default_model: default_model.into(),
    }
  }

  /// Step overrides beat the agent definition, which beats the kind default.
  fn execution_config(&self, overrides: &StepOverrides) -> ExecutionConfig {
    let kind = self.def.kind;
    let model = overrides
      .model
      .clone()
      .or_else(|| self.def.model.clone())
      .unwrap_or_else(|| self.default_model.clone());
    let temperature = overrides
      .temperature
      .or(self.def.temperature)
      .unwrap_or_else(|| default_temperature(kind));
    let structured = overrides
      .structured_output
      .unwrap_or(kind == AgentKind::Scheduler);
    let system_prompt = self
      .def
      .system_prompt
      .clone()
      .unwrap_or_else(|| default_system_prompt(kind).to_string());

    ExecutionConfig::new(model)
      .with_temperature(temperature)
      .with_system_prompt(system_prompt)
      .structured(structured)
  }

  fn user_prompt(&self, action: &str, params: &AgentParams) -> String {
    let mut prompt = format!("Action: {}\n\n{}", action, params.prompt);
    if !params.extra.is_empty() {
      let extra = serde_json::Value::Object(params.extra.clone());
      prompt.push_str(&format!("\n\nParameters: {}", extra));
    }
    prompt
  }

  fn interpret(
    &self,
    params: &AgentParams,
    structured: bool,
    text: &str,
  ) -> Result<StepOutput, AgentError> {
    if text.trim().is_empty() {
      return Err(AgentError::response_shape("model returned no usable content"));
    }

    match self.def.kind {
      AgentKind::Research => Ok(StepOutput::Research(ResearchNotes::parse(
        research_topic(params),
        text,
      ))),
      AgentKind::Writer | AgentKind::Editor => Ok(StepOutput::Draft(DraftContent::parse(text))),
      AgentKind::Scheduler => serde_json::from_str::<ScheduleRecord>(json_body(text))
        .map(StepOutput::Schedule)
        .map_err(|e| AgentError::response_shape(format!("invalid schedule record: {}", e))),
      AgentKind::Generic if structured => serde_json::from_str(json_body(text))
        .map(StepOutput::Json)
        .map_err(|e| AgentError::response_shape(format!("invalid JSON response: {}", e))),
      AgentKind::Generic => Ok(StepOutput::Text(text.trim().to_string())),
    }
  }
}

#[async_trait]
impl Agent for SpecialistAgent {
  fn id(&self) -> &str {
    &self.def.agent_id
  }

  fn kind(&self) -> AgentKind {
    self.def.kind
  }

  fn supports_action(&self, action: &str) -> bool {
    if !self.def.actions.is_empty() {
      return self.def.actions.iter().any(|a| a == action);
    }
    match default_actions(self.def.kind) {
      [] => true,
      actions => actions.iter().any(|a| *a == action),
    }
  }

  fn produces_content(&self, _action: &str) -> bool {
    matches!(
      self.def.kind,
      AgentKind::Writer | AgentKind::Editor | AgentKind::Generic
    )
  }

  async fn execute(&self, action: &str, context: &CallContext, params: &AgentParams) -> StepResult {
    if !self.supports_action(action) {
      return StepResult::from_error(&AgentError::UnsupportedAction {
        agent_id: self.def.agent_id.clone(),
        action: action.to_string(),
      });
    }

    let config = self.execution_config(&params.overrides);
    let structured = config.structured_output;
    let mut request = PromptRequest::new(self.user_prompt(action, params), config);
    request.tags.push(format!("agent:{}", self.def.agent_id));
    request.tags.push(format!("action:{}", action));
    request.options = DispatchOptions {
      execution_mode: params.overrides.execution_mode,
      time_sensitive: params.overrides.time_sensitive,
      guardrails: params.guardrails.clone(),
    };

    let result = match self.pipeline.run(request, context).await {
      Ok(text) => self.interpret(params, structured, &text),
      Err(e) => Err(e),
    };
    if let Err(e) = &result {
      debug!(agent_id = %self.def.agent_id, action, error = %e, "agent_action_failed");
    }
    StepResult::from(result)
  }
}

/// Empty means any action.
fn default_actions(kind: AgentKind) -> &'static [&'static str] {
  match kind {
    AgentKind::Research => &["research", "summarize"],
    AgentKind::Writer => &["draft", "write", "rewrite"],
    AgentKind::Editor => &["edit", "proofread", "polish"],
    AgentKind::Scheduler => &["schedule"],
    AgentKind::Generic => &[],
  }
}

fn default_temperature(kind: AgentKind) -> f32 {
  match kind {
    AgentKind::Research => 0.3,
    AgentKind::Writer => 0.8,
    AgentKind::Editor => 0.4,
    AgentKind::Scheduler => 0.0,
    AgentKind::Generic => 0.7,
  }
}

fn default_system_prompt(kind: AgentKind) -> &'static str {
  match kind {
    AgentKind::Research => {
      "You are a research assistant. Answer with concise factual findings as a bulleted list."
    }
    AgentKind::Writer => {
      "You are a professional writer. Start with a line 'Title: <title>', then write the body."
    }
    AgentKind::Editor => {
      "You are a careful editor. Return only the improved text, keeping any 'Title:' line."
    }
    AgentKind::Scheduler => {
      "You schedule content for publication. Respond with a JSON object with the fields \
       title, scheduled_for (RFC 3339), channel and notes."
    }
    AgentKind::Generic => "You are a helpful assistant.",
  }
}

fn research_topic(params: &AgentParams) -> String {
  if let Some(topic) = params.extra.get("topic").and_then(|t| t.as_str()) {
    return topic.to_string();
  }
  let first_line = params.prompt.lines().next().unwrap_or("").trim();
  first_line.chars().take(80).collect()
}

/// Strip a surrounding markdown code fence, if any.
fn json_body(text: &str) -> &str {
  let trimmed = text.trim();
  let Some(inner) = trimmed.strip_prefix("```") else {
    return trimmed;
  };
  let inner = inner.strip_prefix("json").unwrap_or(inner);
  inner.strip_suffix("```").unwrap_or(inner).trim()
}
