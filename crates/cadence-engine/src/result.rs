use std::collections::HashMap;

use cadence_agent::StepResult;
use serde::Serialize;

use crate::context::{ApprovalStatus, ExecutionContext};

/// Why a run stopped early.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Abort {
  /// A required step failed. `position` is 0-based declaration order.
  StepFailed {
    position: usize,
    name: String,
    error: String,
  },
  Cancelled,
  TimedOut { timeout_ms: u64 },
}

/// Outcome of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowResult {
  pub execution_id: String,
  pub workflow_id: String,
  pub success: bool,
  /// Results of every step that ran, keyed by step id.
  pub steps: HashMap<String, StepResult>,
  /// Steps that never ran, in declaration order.
  pub skipped: Vec<String>,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
  pub approval: ApprovalStatus,
  pub summary: String,
  pub elapsed_ms: u64,
}

impl WorkflowResult {
  pub(crate) fn build(
    context: &ExecutionContext,
    abort: Option<&Abort>,
    skipped: Vec<String>,
    elapsed_ms: u64,
  ) -> Self {
    let success = abort.is_none() && context.errors.is_empty();
    let summary = summarize(context, abort, success);

    Self {
      execution_id: context.execution_id.clone(),
      workflow_id: context.workflow_id.clone(),
      success,
      steps: context.results().clone(),
      skipped,
      errors: context.errors.clone(),
      warnings: context.warnings.clone(),
      approval: context.approval().clone(),
      summary,
      elapsed_ms,
    }
  }

  pub fn is_pending_approval(&self) -> bool {
    self.approval == ApprovalStatus::Pending
  }
}

fn summarize(context: &ExecutionContext, abort: Option<&Abort>, success: bool) -> String {
  match abort {
    Some(Abort::StepFailed {
      position,
      name,
      error,
    }) => return format!("Failed at step {} ({}): {}", position + 1, name, error),
    Some(Abort::Cancelled) => return "Failed: cancelled".to_string(),
    Some(Abort::TimedOut { timeout_ms }) => {
      return format!("Failed: timed out after {} ms", timeout_ms);
    }
    None => {}
  }

  if !success {
    return format!("Failed: {}", context.errors.join("; "));
  }

  let warnings = context.warnings.len();
  match context.approval() {
    ApprovalStatus::Pending => format!("Completed, pending approval ({} warnings)", warnings),
    _ if warnings > 0 => format!("Completed with {} warnings", warnings),
    _ => format!("Completed {} steps", context.results().len()),
  }
}
