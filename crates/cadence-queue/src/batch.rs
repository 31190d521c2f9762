//! Grouping, combined-request framing and response splitting.

use std::collections::HashMap;

use cadence_config::ExecutionConfig;
use cadence_model::ModelRequest;
use serde::Serialize;

use crate::prompt::QueuedPrompt;

/// Literal line separating answers in a combined response.
pub const RESPONSE_SEPARATOR: &str = "---RESPONSE_SEPARATOR---";

/// Outcome of one flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchExecutionResult {
  pub batch_id: String,
  pub prompt_count: usize,
  pub group_count: usize,
  /// Prompts resolved with text (possibly empty after padding).
  pub succeeded: usize,
  /// Prompts rejected because their group's call failed.
  pub failed: usize,
  pub duration_ms: u64,
}

/// Prompts may share a call only when every field here is equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
  model: String,
  temperature_bits: u32,
  structured_output: bool,
  system_prompt: Option<String>,
}

impl GroupKey {
  fn of(config: &ExecutionConfig) -> Self {
    Self {
      model: config.model.clone(),
      temperature_bits: config.temperature.to_bits(),
      structured_output: config.structured_output,
      system_prompt: config.system_prompt.clone(),
    }
  }
}

/// Prompts that go out in one upstream call, in append order.
#[derive(Debug)]
pub(crate) struct BatchGroup {
  pub config: ExecutionConfig,
  pub prompts: Vec<QueuedPrompt>,
}

impl BatchGroup {
  pub fn len(&self) -> usize {
    self.prompts.len()
  }

  /// The single request for this group. A lone prompt is sent as is.
  ///
  /// Structured groups ask for a `{"responses": [...]}` wrapper, since a
  /// JSON-mode endpoint answers with exactly one object.
  pub fn request(&self) -> ModelRequest {
    let prompts = self.prompts.iter().map(|p| p.prompt.as_str());
    match self.prompts.as_slice() {
      [only] => ModelRequest::from_prompt(only.prompt.clone(), &self.config),
      _ if self.config.structured_output => {
        ModelRequest::from_prompt(combined_json_prompt(prompts), &self.config)
      }
      _ => ModelRequest::from_prompt(combined_prompt(prompts), &self.config),
    }
  }

  /// Split the model's answer into one section per prompt.
  pub fn split(&self, response: String) -> Vec<String> {
    let count = self.prompts.len();
    if count == 1 {
      return vec![response];
    }
    if self.config.structured_output {
      if let Some(sections) = split_json_responses(&response, count) {
        return sections;
      }
    }
    split_sections(&response, count)
  }
}

/// Partition by group key. Groups come out in order of first appearance and
/// keep their prompts in append order.
pub(crate) fn partition(prompts: Vec<QueuedPrompt>) -> Vec<BatchGroup> {
  let mut groups: Vec<BatchGroup> = Vec::new();
  let mut index: HashMap<GroupKey, usize> = HashMap::new();

  for prompt in prompts {
    let key = GroupKey::of(&prompt.config);
    match index.get(&key) {
      Some(&i) => groups[i].prompts.push(prompt),
      None => {
        index.insert(key, groups.len());
        groups.push(BatchGroup {
          config: prompt.config.clone(),
          prompts: vec![prompt],
        });
      }
    }
  }

  groups
}

pub(crate) fn combined_prompt<'a>(prompts: impl ExactSizeIterator<Item = &'a str>) -> String {
  let count = prompts.len();
  let mut out = format!(
    "You will receive {count} separate requests. Answer each one independently and in order.\n\
     Start answer k with \"RESPONSE k:\" and put a line containing only {RESPONSE_SEPARATOR} \
     between consecutive answers. Return exactly {count} answers.\n"
  );
  for (i, prompt) in prompts.enumerate() {
    out.push_str(&format!("\n=== REQUEST {} ===\n{}\n", i + 1, prompt));
  }
  out
}

pub(crate) fn combined_json_prompt<'a>(prompts: impl ExactSizeIterator<Item = &'a str>) -> String {
  let count = prompts.len();
  let mut out = format!(
    "You will receive {count} separate requests. Answer each one independently and in order.\n\
     Respond with one JSON object of the form {{\"responses\": [answer 1, ..., answer {count}]}} \
     where answer k is the JSON value answering request k. Return exactly {count} answers.\n"
  );
  for (i, prompt) in prompts.enumerate() {
    out.push_str(&format!("\n=== REQUEST {} ===\n{}\n", i + 1, prompt));
  }
  out
}

/// Read the `responses` array (or a bare top-level array) of a structured
/// answer. String entries are used as is, other values are re-serialized.
/// `None` when the answer holds no such array.
pub(crate) fn split_json_responses(response: &str, count: usize) -> Option<Vec<String>> {
  let value: serde_json::Value = serde_json::from_str(response.trim()).ok()?;
  let entries = match value {
    serde_json::Value::Array(entries) => entries,
    serde_json::Value::Object(mut map) => match map.remove("responses") {
      Some(serde_json::Value::Array(entries)) => entries,
      _ => return None,
    },
    _ => return None,
  };

  let mut sections: Vec<String> = entries
    .into_iter()
    .map(|entry| match entry {
      serde_json::Value::String(text) => text,
      other => other.to_string(),
    })
    .collect();
  sections.resize(count, String::new());
  Some(sections)
}

/// Split on the separator, strip framing, then pad with empty strings or
/// truncate to exactly `count` sections.
pub(crate) fn split_sections(response: &str, count: usize) -> Vec<String> {
  let mut sections: Vec<String> = response
    .split(RESPONSE_SEPARATOR)
    .map(|s| strip_framing(s).to_string())
    .collect();
  sections.resize(count, String::new());
  sections
}

fn strip_framing(section: &str) -> &str {
  let mut rest = section.trim();
  if let Some(tail) = strip_numbered(rest, "=== REQUEST ", " ===") {
    rest = tail;
  }
  if let Some(tail) = strip_numbered(rest, "RESPONSE ", ":") {
    rest = tail;
  }
  rest
}

/// Strip `<prefix><digits><suffix>` from the front of `text`.
fn strip_numbered<'a>(text: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
  let after = text.strip_prefix(prefix)?;
  let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
  if digits == 0 {
    return None;
  }
  after[digits..].strip_prefix(suffix).map(str::trim)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn queued(prompt: &str, config: ExecutionConfig) -> QueuedPrompt {
    QueuedPrompt::new(prompt.to_string(), Vec::new(), config).0
  }

  #[test]
  fn test_partition_by_config() {
    let cold = ExecutionConfig::new("m").with_temperature(0.2);
    let hot = ExecutionConfig::new("m").with_temperature(0.9);
    let groups = partition(vec![
      queued("a", cold.clone()),
      queued("b", hot.clone()),
      queued("c", cold.clone()),
      queued("d", cold.clone().with_system_prompt("sys")),
    ]);

    assert_eq!(groups.len(), 3);
    let prompts: Vec<Vec<&str>> = groups
      .iter()
      .map(|g| g.prompts.iter().map(|p| p.prompt.as_str()).collect())
      .collect();
    assert_eq!(prompts, vec![vec!["a", "c"], vec!["b"], vec!["d"]]);
    assert_eq!(groups[1].config.temperature, 0.9);
  }

  #[test]
  fn test_structured_flag_splits_groups() {
    let base = ExecutionConfig::new("m");
    let groups = partition(vec![
      queued("a", base.clone()),
      queued("b", base.clone().structured(true)),
    ]);
    assert_eq!(groups.len(), 2);
  }

  #[test]
  fn test_split_strips_framing() {
    let response = format!(
      "RESPONSE 1: first\n{sep}\n=== REQUEST 2 ===\nRESPONSE 2: second\n{sep}\nthird",
      sep = RESPONSE_SEPARATOR
    );
    assert_eq!(
      split_sections(&response, 3),
      vec!["first", "second", "third"]
    );
  }

  #[test]
  fn test_split_pads_missing_sections() {
    let response = format!("RESPONSE 1: only{}RESPONSE 2: two", RESPONSE_SEPARATOR);
    assert_eq!(split_sections(&response, 4), vec!["only", "two", "", ""]);
  }

  #[test]
  fn test_split_truncates_extra_sections() {
    let response = ["a", "b", "c"].join(RESPONSE_SEPARATOR);
    assert_eq!(split_sections(&response, 2), vec!["a", "b"]);
  }

  #[test]
  fn test_strip_framing_leaves_plain_text() {
    assert_eq!(strip_framing("  RESPONSES are fine "), "RESPONSES are fine");
    assert_eq!(strip_framing("RESPONSE x: kept"), "RESPONSE x: kept");
    assert_eq!(strip_framing("RESPONSE 12:done"), "done");
  }

  #[test]
  fn test_combined_prompt_numbers_requests() {
    let text = combined_prompt(["one", "two"].into_iter());
    assert!(text.contains("2 separate requests"));
    assert!(text.contains("=== REQUEST 1 ===\none"));
    assert!(text.contains("=== REQUEST 2 ===\ntwo"));
    assert!(text.contains(RESPONSE_SEPARATOR));
  }

  #[test]
  fn test_structured_group_asks_for_responses_wrapper() {
    let config = ExecutionConfig::new("m").structured(true);
    let group = BatchGroup {
      config: config.clone(),
      prompts: vec![queued("first", config.clone()), queued("second", config)],
    };

    let request = group.request();
    assert!(request.structured_output);
    let text = &request.messages[0].content;
    assert!(text.contains("\"responses\""));
    assert!(text.contains("=== REQUEST 2 ===\nsecond"));
    assert!(!text.contains(RESPONSE_SEPARATOR));

    let sections = group.split(r#"{"responses": [{"title": "A"}, "plain"]}"#.to_string());
    assert_eq!(sections, vec![r#"{"title":"A"}"#, "plain"]);
  }

  #[test]
  fn test_json_responses_pad_and_fall_back() {
    assert_eq!(
      split_json_responses(r#"[1]"#, 3),
      Some(vec!["1".to_string(), String::new(), String::new()])
    );
    assert_eq!(split_json_responses(r#"{"title": "only one"}"#, 2), None);
    assert_eq!(split_json_responses("not json", 2), None);
  }

  #[test]
  fn test_single_prompt_group_is_unframed() {
    let config = ExecutionConfig::new("m").with_system_prompt("sys");
    let group = BatchGroup {
      config: config.clone(),
      prompts: vec![queued("just this", config)],
    };
    let request = group.request();
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.messages[1].content, "just this");
    assert_eq!(
      group.split(format!("a{}b", RESPONSE_SEPARATOR)),
      vec![format!("a{}b", RESPONSE_SEPARATOR)]
    );
  }
}
