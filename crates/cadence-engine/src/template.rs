//! Prompt template resolution.
//!
//! Tokens are `{{ ... }}` spans. The required forms are resolved directly:
//!
//! ```text
//! {{research.result}}    template text of a successful step
//! {{userId}}             the run's user id
//! {{sessionId}}          the run's session id, when there is one
//! ```
//!
//! Anything else is evaluated as a minijinja expression against
//! `{ input: <initial data>, <step_id>: { result: <structured output> } }`,
//! so `{{input.topic | upper}}` and `{{schedule.result.channel}}` work too.
//! A token that cannot be resolved (unknown step, failed step, missing
//! field, syntax error) is left verbatim.

use minijinja::value::ValueKind;
use minijinja::{Environment, Value};

use crate::context::ExecutionContext;

pub fn resolve_prompt(template: &str, context: &ExecutionContext) -> String {
  if !template.contains("{{") {
    return template.to_string();
  }

  let env = Environment::new();
  let scope = Value::from_serialize(expression_scope(context));
  let mut out = String::with_capacity(template.len());
  let mut rest = template;

  while let Some(start) = rest.find("{{") {
    let Some(len) = rest[start + 2..].find("}}") else {
      break;
    };
    let end = start + 2 + len + 2;
    let token = &rest[start..end];
    let expr = token[2..token.len() - 2].trim();

    out.push_str(&rest[..start]);
    match resolve_token(expr, context, &env, &scope) {
      Some(value) => out.push_str(&value),
      None => out.push_str(token),
    }
    rest = &rest[end..];
  }

  out.push_str(rest);
  out
}

fn resolve_token(
  expr: &str,
  context: &ExecutionContext,
  env: &Environment<'_>,
  scope: &Value,
) -> Option<String> {
  match expr {
    "userId" => return Some(context.user_id.clone()),
    "sessionId" => return context.session_id.clone(),
    _ => {}
  }

  if let Some(step_id) = expr.strip_suffix(".result") {
    if let Some(output) = context.result(step_id).and_then(|r| r.output()) {
      return Some(output.as_template_text());
    }
  }

  let value = env.compile_expression(expr).ok()?.eval(scope).ok()?;
  render(&value)
}

fn render(value: &Value) -> Option<String> {
  if value.is_undefined() || value.is_none() {
    return None;
  }
  if let Some(s) = value.as_str() {
    return Some(s.to_string());
  }
  match value.kind() {
    ValueKind::Map | ValueKind::Seq => serde_json::to_string(value).ok(),
    _ => Some(value.to_string()),
  }
}

/// Only successful steps are visible to expressions.
fn expression_scope(context: &ExecutionContext) -> serde_json::Value {
  let mut scope = serde_json::Map::new();
  for (step_id, result) in context.results() {
    if let Some(output) = result.output() {
      scope.insert(
        step_id.clone(),
        serde_json::json!({ "result": output.to_value() }),
      );
    }
  }
  scope.insert("input".to_string(), context.initial_data.clone());
  scope.insert("userId".to_string(), context.user_id.clone().into());
  if let Some(session_id) = &context.session_id {
    scope.insert("sessionId".to_string(), session_id.clone().into());
  }
  serde_json::Value::Object(scope)
}
