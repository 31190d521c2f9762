//! Execution events and notifiers for observability.
//!
//! Events mirror the `tracing` lifecycle events and let embedders persist or
//! stream progress without parsing logs.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  WorkflowStarted {
    execution_id: String,
    workflow_id: String,
  },

  StepStarted {
    execution_id: String,
    step_id: String,
  },

  StepCompleted {
    execution_id: String,
    step_id: String,
    output: serde_json::Value,
  },

  StepFailed {
    execution_id: String,
    step_id: String,
    error: String,
    optional: bool,
  },

  /// The step never ran.
  StepSkipped {
    execution_id: String,
    step_id: String,
    reason: String,
  },

  /// Output failed the workflow's guardrails policy.
  GuardrailFlagged {
    execution_id: String,
    step_id: String,
    violations: Vec<String>,
  },

  WorkflowCompleted {
    execution_id: String,
    approval_pending: bool,
  },

  WorkflowFailed { execution_id: String, error: String },
}

/// Receives execution events. Called inline by the engine, so
/// implementations should not block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a workflow; volume is a
  // handful of events per step.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
