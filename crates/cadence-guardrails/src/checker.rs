use cadence_config::GuardrailPolicy;
use serde::{Deserialize, Serialize};

/// Who the checked content belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckContext {
  pub user_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub session_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub step_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
  ForbiddenPhrase,
  MissingPhrase,
  TooShort,
  TooLong,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
  pub kind: ViolationKind,
  pub message: String,
}

impl std::fmt::Display for Violation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.message)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailReport {
  pub passed: bool,
  pub violations: Vec<Violation>,
  pub suggestions: Vec<String>,
}

impl GuardrailReport {
  pub fn pass() -> Self {
    Self {
      passed: true,
      violations: Vec::new(),
      suggestions: Vec::new(),
    }
  }

  /// Violation messages joined for warnings and logs.
  pub fn describe(&self) -> String {
    self
      .violations
      .iter()
      .map(|v| v.message.as_str())
      .collect::<Vec<_>>()
      .join("; ")
  }
}

/// Checks generated content against a policy.
///
/// Checks are synchronous and side-effect free; a failed check is never an
/// error, only a report with `passed = false`.
pub trait GuardrailsChecker: Send + Sync {
  fn check(&self, content: &str, policy: &GuardrailPolicy, context: &CheckContext) -> GuardrailReport;
}
