use serde::{Deserialize, Serialize};

/// Content policy applied to generated text.
///
/// Phrase matching is case-insensitive. Length bounds count characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailPolicy {
  #[serde(default)]
  pub forbidden_phrases: Vec<String>,
  #[serde(default)]
  pub required_phrases: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub min_length: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_length: Option<usize>,
  /// A failed check on workflow output parks the run in `pending` approval.
  #[serde(default)]
  pub require_approval: bool,
}

impl GuardrailPolicy {
  /// True when the policy has no rules at all.
  pub fn is_empty(&self) -> bool {
    self.forbidden_phrases.is_empty()
      && self.required_phrases.is_empty()
      && self.min_length.is_none()
      && self.max_length.is_none()
  }
}
