use std::collections::HashMap;

use cadence_config::{GuardrailPolicy, StepDef, WorkflowDef};
use serde::Serialize;

use crate::error::WorkflowError;
use crate::graph::Graph;

/// A locked workflow ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  /// Steps in declaration order.
  pub steps: Vec<StepDef>,
  pub max_parallel: usize,
  pub guardrails: GuardrailPolicy,
  pub timeout_ms: Option<u64>,
  #[serde(skip)]
  index: HashMap<String, usize>,
}

impl Workflow {
  /// Validate a definition and lock it.
  ///
  /// This process:
  /// 1. Checks step ids are present and unique
  /// 2. Checks every dependency names a declared step
  /// 3. Rejects dependency cycles (including self-dependencies)
  pub fn lock(def: WorkflowDef) -> Result<Self, WorkflowError> {
    if def.steps.is_empty() {
      return Err(WorkflowError::EmptyWorkflow);
    }
    if def.max_parallel == 0 {
      return Err(WorkflowError::InvalidParallelism);
    }

    let mut index = HashMap::with_capacity(def.steps.len());
    for (position, step) in def.steps.iter().enumerate() {
      validate_step(step)?;
      if index.insert(step.step_id.clone(), position).is_some() {
        return Err(WorkflowError::DuplicateStep(step.step_id.clone()));
      }
    }

    for step in &def.steps {
      for dep in &step.depends_on {
        if !index.contains_key(dep) {
          return Err(WorkflowError::UnknownDependency {
            step_id: step.step_id.clone(),
            dependency: dep.clone(),
          });
        }
      }
    }

    let order: Vec<String> = def.steps.iter().map(|s| s.step_id.clone()).collect();
    if let Some(path) = Graph::new(&def.steps).find_cycle(&order) {
      return Err(WorkflowError::CycleDetected { path });
    }

    Ok(Self {
      workflow_id: def.workflow_id,
      name: def.name,
      steps: def.steps,
      max_parallel: def.max_parallel,
      guardrails: def.guardrails,
      timeout_ms: def.timeout_ms,
      index,
    })
  }

  /// Get a step by ID.
  pub fn get_step(&self, step_id: &str) -> Option<&StepDef> {
    self.position(step_id).map(|i| &self.steps[i])
  }

  /// Declaration index of a step.
  pub fn position(&self, step_id: &str) -> Option<usize> {
    self.index.get(step_id).copied()
  }
}

fn validate_step(step: &StepDef) -> Result<(), WorkflowError> {
  let invalid = |message: &str| WorkflowError::InvalidStep {
    step_id: step.step_id.clone(),
    message: message.to_string(),
  };

  if step.step_id.trim().is_empty() {
    return Err(invalid("step_id is empty"));
  }
  if step.agent_id.trim().is_empty() {
    return Err(invalid("agent_id is empty"));
  }
  if step.action.trim().is_empty() {
    return Err(invalid("action is empty"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn step(id: &str, deps: &[&str]) -> StepDef {
    StepDef {
      step_id: id.to_string(),
      agent_id: "writer".to_string(),
      name: String::new(),
      action: "draft".to_string(),
      prompt: String::new(),
      depends_on: deps.iter().map(|d| d.to_string()).collect(),
      optional: false,
      overrides: Default::default(),
      params: Default::default(),
    }
  }

  fn def(steps: Vec<StepDef>) -> WorkflowDef {
    WorkflowDef {
      workflow_id: "wf".to_string(),
      name: "Test".to_string(),
      steps,
      max_parallel: 2,
      guardrails: GuardrailPolicy::default(),
      timeout_ms: None,
    }
  }

  #[test]
  fn test_lock_valid_workflow() {
    let wf = Workflow::lock(def(vec![
      step("a", &[]),
      step("b", &[]),
      step("c", &["a", "b"]),
    ]))
    .unwrap();

    assert_eq!(wf.position("c"), Some(2));
    assert_eq!(wf.get_step("b").unwrap().step_id, "b");
    assert!(wf.get_step("zzz").is_none());
  }

  #[test]
  fn test_empty_workflow_rejected() {
    assert_eq!(
      Workflow::lock(def(vec![])).unwrap_err(),
      WorkflowError::EmptyWorkflow
    );
  }

  #[test]
  fn test_zero_parallelism_rejected() {
    let mut d = def(vec![step("a", &[])]);
    d.max_parallel = 0;
    assert_eq!(
      Workflow::lock(d).unwrap_err(),
      WorkflowError::InvalidParallelism
    );
  }

  #[test]
  fn test_duplicate_step_rejected() {
    let err = Workflow::lock(def(vec![step("a", &[]), step("a", &[])])).unwrap_err();
    assert_eq!(err, WorkflowError::DuplicateStep("a".to_string()));
  }

  #[test]
  fn test_unknown_dependency_rejected() {
    let err = Workflow::lock(def(vec![step("a", &["ghost"])])).unwrap_err();
    assert_eq!(
      err,
      WorkflowError::UnknownDependency {
        step_id: "a".to_string(),
        dependency: "ghost".to_string(),
      }
    );
  }

  #[test]
  fn test_cycle_rejected() {
    let err = Workflow::lock(def(vec![
      step("a", &["b"]),
      step("b", &["a"]),
      step("c", &[]),
    ]))
    .unwrap_err();
    match err {
      WorkflowError::CycleDetected { path } => {
        assert_eq!(path, vec!["a", "b", "a"]);
      }
      other => panic!("expected cycle, got {other:?}"),
    }
  }

  #[test]
  fn test_blank_agent_rejected() {
    let mut s = step("a", &[]);
    s.agent_id = " ".to_string();
    assert!(matches!(
      Workflow::lock(def(vec![s])).unwrap_err(),
      WorkflowError::InvalidStep { .. }
    ));
  }
}
