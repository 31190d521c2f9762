//! Typed step outputs.

use serde::{Deserialize, Serialize};

/// Output of a successful step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StepOutput {
  Text(String),
  Draft(DraftContent),
  Research(ResearchNotes),
  Schedule(ScheduleRecord),
  Json(serde_json::Value),
  Empty,
}

impl StepOutput {
  /// Text substituted for `{{<step>.result}}` in later prompts.
  pub fn as_template_text(&self) -> String {
    match self {
      StepOutput::Text(text) => text.clone(),
      StepOutput::Draft(draft) => draft.to_text(),
      StepOutput::Research(notes) => notes.to_text(),
      StepOutput::Schedule(record) => serde_json::to_string(record).unwrap_or_default(),
      StepOutput::Json(serde_json::Value::String(s)) => s.clone(),
      StepOutput::Json(value) => value.to_string(),
      StepOutput::Empty => String::new(),
    }
  }

  /// Structured view used for `{{<step>.result.<field>}}` lookups.
  pub fn to_value(&self) -> serde_json::Value {
    match self {
      StepOutput::Text(text) => serde_json::Value::String(text.clone()),
      StepOutput::Draft(draft) => serde_json::to_value(draft).unwrap_or_default(),
      StepOutput::Research(notes) => serde_json::to_value(notes).unwrap_or_default(),
      StepOutput::Schedule(record) => serde_json::to_value(record).unwrap_or_default(),
      StepOutput::Json(value) => value.clone(),
      StepOutput::Empty => serde_json::Value::Null,
    }
  }

  /// The text guardrails should look at, if this output is content.
  pub fn content(&self) -> Option<String> {
    match self {
      StepOutput::Text(text) => Some(text.clone()),
      StepOutput::Draft(draft) => Some(draft.to_text()),
      _ => None,
    }
  }
}

/// A piece of written content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContent {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  pub body: String,
}

impl DraftContent {
  /// Split a leading `Title:` or markdown `#` heading off the body.
  pub fn parse(text: &str) -> Self {
    let trimmed = text.trim();
    let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    let heading = first.trim();

    let title = heading
      .strip_prefix("Title:")
      .or_else(|| heading.strip_prefix("# "))
      .map(|t| t.trim().to_string())
      .filter(|t| !t.is_empty());

    match title {
      Some(title) => Self {
        title: Some(title),
        body: rest.trim().to_string(),
      },
      None => Self {
        title: None,
        body: trimmed.to_string(),
      },
    }
  }

  pub fn to_text(&self) -> String {
    match &self.title {
      Some(title) if self.body.is_empty() => title.clone(),
      Some(title) => format!("{}\n\n{}", title, self.body),
      None => self.body.clone(),
    }
  }
}

/// Findings gathered by a research agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchNotes {
  pub topic: String,
  pub findings: Vec<String>,
}

impl ResearchNotes {
  /// Bullet and numbered lines become findings. Text without any list
  /// becomes a single finding.
  pub fn parse(topic: impl Into<String>, text: &str) -> Self {
    let bullets: Vec<String> = text
      .lines()
      .filter_map(list_item)
      .filter(|item| !item.is_empty())
      .map(str::to_string)
      .collect();

    let findings = if bullets.is_empty() {
      vec![text.trim().to_string()]
    } else {
      bullets
    };

    Self {
      topic: topic.into(),
      findings,
    }
  }

  pub fn to_text(&self) -> String {
    self
      .findings
      .iter()
      .map(|f| format!("- {}", f))
      .collect::<Vec<_>>()
      .join("\n")
  }
}

fn list_item(line: &str) -> Option<&str> {
  let line = line.trim();
  if let Some(rest) = line
    .strip_prefix("- ")
    .or_else(|| line.strip_prefix("* "))
    .or_else(|| line.strip_prefix("• "))
  {
    return Some(rest.trim());
  }

  let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
  if digits == 0 {
    return None;
  }
  line[digits..]
    .strip_prefix(". ")
    .or_else(|| line[digits..].strip_prefix(") "))
    .map(str::trim)
}

/// A scheduled publication, parsed from a structured model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
  pub title: String,
  /// When to publish, as the model returned it (usually RFC 3339).
  pub scheduled_for: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub channel: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_draft_with_title_line() {
    let draft = DraftContent::parse("Title: Launch day\n\nWe shipped it.");
    assert_eq!(draft.title.as_deref(), Some("Launch day"));
    assert_eq!(draft.body, "We shipped it.");
    assert_eq!(draft.to_text(), "Launch day\n\nWe shipped it.");
  }

  #[test]
  fn test_draft_with_markdown_heading() {
    let draft = DraftContent::parse("# Notes\nbody text");
    assert_eq!(draft.title.as_deref(), Some("Notes"));
    assert_eq!(draft.body, "body text");
  }

  #[test]
  fn test_draft_without_title() {
    let draft = DraftContent::parse("  just a paragraph\nand another  ");
    assert!(draft.title.is_none());
    assert_eq!(draft.body, "just a paragraph\nand another");
  }

  #[test]
  fn test_research_bullets_and_numbers() {
    let notes = ResearchNotes::parse("rust", "Intro line\n- fast\n* safe\n3. fun\n10) mature\n-\n");
    assert_eq!(notes.findings, vec!["fast", "safe", "fun", "mature"]);
    assert_eq!(notes.to_text(), "- fast\n- safe\n- fun\n- mature");
  }

  #[test]
  fn test_research_plain_text_is_single_finding() {
    let notes = ResearchNotes::parse("topic", "  one finding only ");
    assert_eq!(notes.findings, vec!["one finding only"]);
  }

  #[test]
  fn test_template_text_and_value() {
    let record = ScheduleRecord {
      title: "Post".to_string(),
      scheduled_for: "2026-01-01T09:00:00Z".to_string(),
      channel: Some("blog".to_string()),
      notes: None,
    };
    let output = StepOutput::Schedule(record);
    assert_eq!(output.to_value()["channel"], "blog");
    assert!(output.as_template_text().contains("\"scheduled_for\""));
    assert!(output.content().is_none());

    let json = StepOutput::Json(serde_json::json!("plain"));
    assert_eq!(json.as_template_text(), "plain");
    assert_eq!(StepOutput::Empty.as_template_text(), "");
  }

  #[test]
  fn test_serialized_tagging() {
    let value = serde_json::to_value(StepOutput::Text("hi".to_string())).unwrap();
    assert_eq!(value, serde_json::json!({ "type": "text", "data": "hi" }));
  }
}
