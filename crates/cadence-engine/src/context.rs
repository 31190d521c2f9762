use std::collections::HashMap;

use cadence_agent::StepResult;
use serde::{Deserialize, Serialize};

/// Who a workflow runs for, and the data it starts with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
  pub user_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub session_id: Option<String>,
  /// Available to prompts as `{{input.<path>}}`.
  #[serde(default)]
  pub initial_data: serde_json::Value,
}

impl RunRequest {
  pub fn new(user_id: impl Into<String>) -> Self {
    Self {
      user_id: user_id.into(),
      session_id: None,
      initial_data: serde_json::Value::Null,
    }
  }

  pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
    self.session_id = Some(session_id.into());
    self
  }

  pub fn with_initial_data(mut self, initial_data: serde_json::Value) -> Self {
    self.initial_data = initial_data;
    self
  }
}

/// Human sign-off state of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApprovalStatus {
  #[default]
  NotRequired,
  Pending,
  Approved,
  Rejected { reason: String },
}

/// State of one workflow run.
///
/// Step results are append-only: once a step id is recorded it keeps its
/// result, except when `resume` deliberately re-runs that step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
  pub execution_id: String,
  pub workflow_id: String,
  pub user_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub session_id: Option<String>,
  #[serde(default)]
  pub initial_data: serde_json::Value,
  results: HashMap<String, StepResult>,
  #[serde(default)]
  pub errors: Vec<String>,
  #[serde(default)]
  pub warnings: Vec<String>,
  #[serde(default)]
  approval: ApprovalStatus,
}

impl ExecutionContext {
  pub fn new(workflow_id: impl Into<String>, request: &RunRequest) -> Self {
    Self {
      execution_id: uuid::Uuid::new_v4().to_string(),
      workflow_id: workflow_id.into(),
      user_id: request.user_id.clone(),
      session_id: request.session_id.clone(),
      initial_data: request.initial_data.clone(),
      results: HashMap::new(),
      errors: Vec::new(),
      warnings: Vec::new(),
      approval: ApprovalStatus::NotRequired,
    }
  }

  /// Record a step result. Returns false, leaving the existing result in
  /// place, if the step already has one.
  pub fn record(&mut self, step_id: impl Into<String>, result: StepResult) -> bool {
    match self.results.entry(step_id.into()) {
      std::collections::hash_map::Entry::Occupied(_) => false,
      std::collections::hash_map::Entry::Vacant(slot) => {
        slot.insert(result);
        true
      }
    }
  }

  pub fn result(&self, step_id: &str) -> Option<&StepResult> {
    self.results.get(step_id)
  }

  pub fn results(&self) -> &HashMap<String, StepResult> {
    &self.results
  }

  /// Drop a step's result so `resume` can run it again.
  pub(crate) fn reset_step(&mut self, step_id: &str) {
    self.results.remove(step_id);
  }

  pub fn approval(&self) -> &ApprovalStatus {
    &self.approval
  }

  pub(crate) fn request_approval(&mut self) {
    if self.approval == ApprovalStatus::NotRequired {
      self.approval = ApprovalStatus::Pending;
    }
  }

  /// Approve a pending run. Returns false if nothing was pending.
  pub fn approve(&mut self) -> bool {
    if self.approval != ApprovalStatus::Pending {
      return false;
    }
    self.approval = ApprovalStatus::Approved;
    true
  }

  /// Reject a pending run. Returns false if nothing was pending.
  pub fn reject(&mut self, reason: impl Into<String>) -> bool {
    if self.approval != ApprovalStatus::Pending {
      return false;
    }
    self.approval = ApprovalStatus::Rejected {
      reason: reason.into(),
    };
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use cadence_agent::{FailureKind, StepOutput};

  fn context() -> ExecutionContext {
    ExecutionContext::new("wf", &RunRequest::new("u").with_session("s"))
  }

  #[test]
  fn test_record_is_insert_once() {
    let mut context = context();
    assert!(context.record("a", StepResult::succeeded(StepOutput::Empty)));
    assert!(!context.record("a", StepResult::failed(FailureKind::Internal, "late")));
    assert!(context.result("a").unwrap().is_success());
  }

  #[test]
  fn test_approval_only_acts_on_pending() {
    let mut context = context();
    assert!(!context.approve());
    assert!(!context.reject("no"));
    assert_eq!(context.approval(), &ApprovalStatus::NotRequired);

    context.request_approval();
    assert!(context.reject("off-brand"));
    assert_eq!(
      context.approval(),
      &ApprovalStatus::Rejected {
        reason: "off-brand".to_string()
      }
    );
    assert!(!context.approve());
  }

  #[test]
  fn test_request_approval_does_not_reopen_decision() {
    let mut context = context();
    context.request_approval();
    assert!(context.approve());
    context.request_approval();
    assert_eq!(context.approval(), &ApprovalStatus::Approved);
  }
}
