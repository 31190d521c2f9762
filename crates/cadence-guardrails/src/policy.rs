use cadence_config::GuardrailPolicy;
use tracing::debug;

use crate::checker::{CheckContext, GuardrailReport, GuardrailsChecker, Violation, ViolationKind};

/// Case-insensitive phrase matching plus character-count bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyChecker;

impl GuardrailsChecker for PolicyChecker {
  fn check(&self, content: &str, policy: &GuardrailPolicy, context: &CheckContext) -> GuardrailReport {
    if policy.is_empty() {
      return GuardrailReport::pass();
    }

    let lowered = content.to_lowercase();
    let length = content.chars().count();
    let mut violations = Vec::new();
    let mut suggestions = Vec::new();

    for phrase in &policy.forbidden_phrases {
      if lowered.contains(&phrase.to_lowercase()) {
        violations.push(Violation {
          kind: ViolationKind::ForbiddenPhrase,
          message: format!("contains forbidden phrase '{}'", phrase),
        });
        suggestions.push(format!("remove or rephrase '{}'", phrase));
      }
    }

    for phrase in &policy.required_phrases {
      if !lowered.contains(&phrase.to_lowercase()) {
        violations.push(Violation {
          kind: ViolationKind::MissingPhrase,
          message: format!("missing required phrase '{}'", phrase),
        });
        suggestions.push(format!("mention '{}'", phrase));
      }
    }

    if let Some(min) = policy.min_length.filter(|&min| length < min) {
      violations.push(Violation {
        kind: ViolationKind::TooShort,
        message: format!("content is {} characters, minimum is {}", length, min),
      });
      suggestions.push(format!("expand to at least {} characters", min));
    }

    if let Some(max) = policy.max_length.filter(|&max| length > max) {
      violations.push(Violation {
        kind: ViolationKind::TooLong,
        message: format!("content is {} characters, maximum is {}", length, max),
      });
      suggestions.push(format!("shorten to at most {} characters", max));
    }

    debug!(
      user_id = %context.user_id,
      step_id = ?context.step_id,
      violations = violations.len(),
      "guardrails_checked"
    );

    GuardrailReport {
      passed: violations.is_empty(),
      violations,
      suggestions,
    }
  }
}
