//! Workflow execution engine.
//!
//! Steps run in waves: every iteration computes the ready set, takes up to
//! `max_parallel` ready steps in declaration order and runs them
//! concurrently. A step is ready when each dependency succeeded, or failed
//! but is optional.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cadence_agent::{AgentParams, AgentRegistry, CallContext, FailureKind, StepOutcome, StepResult};
use cadence_config::{EngineConfig, StepDef, WorkflowDef};
use cadence_guardrails::{CheckContext, GuardrailsChecker};
use cadence_workflow::Workflow;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::context::{ExecutionContext, RunRequest};
use crate::error::EngineError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::result::{Abort, WorkflowResult};
use crate::template::resolve_prompt;

/// A finished run: the result plus the context, which is needed for
/// `approve`, `reject` and `resume`.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
  pub result: WorkflowResult,
  pub context: ExecutionContext,
}

/// Where a step stands relative to its dependencies.
enum Readiness {
  Ready,
  Waiting,
  /// A required dependency failed or will never run.
  Blocked { dependency: String },
}

/// The workflow execution engine.
///
/// Generic over `N: ExecutionNotifier` so embedders choose how events are
/// observed. `WorkflowEngine::new` discards them.
pub struct WorkflowEngine<N: ExecutionNotifier = NoopNotifier> {
  registry: Arc<AgentRegistry>,
  checker: Arc<dyn GuardrailsChecker>,
  config: EngineConfig,
  notifier: N,
}

impl WorkflowEngine<NoopNotifier> {
  pub fn new(
    registry: Arc<AgentRegistry>,
    checker: Arc<dyn GuardrailsChecker>,
    config: EngineConfig,
  ) -> Self {
    Self::with_notifier(registry, checker, config, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> WorkflowEngine<N> {
  pub fn with_notifier(
    registry: Arc<AgentRegistry>,
    checker: Arc<dyn GuardrailsChecker>,
    config: EngineConfig,
    notifier: N,
  ) -> Self {
    Self {
      registry,
      checker,
      config,
      notifier,
    }
  }

  pub fn registry(&self) -> &Arc<AgentRegistry> {
    &self.registry
  }

  /// Validate a definition and check every step can be routed to an agent.
  pub fn prepare(&self, def: &WorkflowDef) -> Result<Workflow, EngineError> {
    let workflow = Workflow::lock(def.clone())?;
    for step in &workflow.steps {
      self
        .registry
        .resolve(&step.agent_id, &step.action)
        .map_err(|source| EngineError::Unroutable {
          step_id: step.step_id.clone(),
          source,
        })?;
    }
    Ok(workflow)
  }

  /// Run a workflow to completion.
  ///
  /// Structural problems fail fast with an [`EngineError`] before any step
  /// runs. Step failures are reported in the returned result.
  #[instrument(
    name = "workflow_execute",
    skip(self, def, request, cancel),
    fields(workflow_id = %def.workflow_id, user_id = %request.user_id)
  )]
  pub async fn execute(
    &self,
    def: &WorkflowDef,
    request: RunRequest,
    cancel: CancellationToken,
  ) -> Result<WorkflowRun, EngineError> {
    let workflow = self.prepare(def)?;
    let mut context = ExecutionContext::new(&workflow.workflow_id, &request);
    let scope: Vec<&StepDef> = workflow.steps.iter().collect();

    let result = self.run(&workflow, &mut context, scope, &cancel).await?;
    Ok(WorkflowRun { result, context })
  }

  /// Re-run the steps from `from_step` (declaration index, default 0)
  /// onwards against an existing context.
  ///
  /// Prior errors are cleared and the re-run steps lose their old results.
  /// Results of earlier steps stay and feed templates as before.
  #[instrument(
    name = "workflow_resume",
    skip(self, def, context, cancel),
    fields(workflow_id = %def.workflow_id, execution_id = %context.execution_id)
  )]
  pub async fn resume(
    &self,
    def: &WorkflowDef,
    context: &mut ExecutionContext,
    from_step: Option<usize>,
    cancel: CancellationToken,
  ) -> Result<WorkflowResult, EngineError> {
    let workflow = self.prepare(def)?;
    if context.workflow_id != workflow.workflow_id {
      return Err(EngineError::ContextMismatch {
        expected: workflow.workflow_id.clone(),
        found: context.workflow_id.clone(),
      });
    }

    let from = from_step.unwrap_or(0);
    if from >= workflow.steps.len() {
      return Err(EngineError::InvalidResumePoint {
        index: from,
        len: workflow.steps.len(),
      });
    }

    context.errors.clear();
    for step in &workflow.steps[from..] {
      context.reset_step(&step.step_id);
    }
    let scope: Vec<&StepDef> = workflow.steps[from..].iter().collect();

    self.run(&workflow, context, scope, &cancel).await
  }

  /// Run a single step against a fresh context.
  ///
  /// Dependencies are not executed; their tokens stay verbatim unless the
  /// initial data provides what the prompt needs.
  pub async fn execute_step(
    &self,
    def: &WorkflowDef,
    step_id: &str,
    request: RunRequest,
  ) -> Result<StepResult, EngineError> {
    let workflow = self.prepare(def)?;
    let step = workflow
      .get_step(step_id)
      .ok_or_else(|| EngineError::UnknownStep(step_id.to_string()))?;
    let mut context = ExecutionContext::new(&workflow.workflow_id, &request);

    let outcomes = self
      .run_wave(&workflow, &context, &[step], &CancellationToken::new())
      .await?;
    let (step, result) = outcomes
      .into_iter()
      .next()
      .ok_or_else(|| EngineError::UnknownStep(step_id.to_string()))?;
    self.record(&workflow, &mut context, step, result);

    context
      .result(&step.step_id)
      .cloned()
      .ok_or_else(|| EngineError::UnknownStep(step_id.to_string()))
  }

  async fn run(
    &self,
    workflow: &Workflow,
    context: &mut ExecutionContext,
    scope: Vec<&StepDef>,
    cancel: &CancellationToken,
  ) -> Result<WorkflowResult, EngineError> {
    let started = Instant::now();
    let execution_id = context.execution_id.clone();

    info!(
      execution_id = %execution_id,
      workflow_id = %workflow.workflow_id,
      steps = scope.len(),
      "workflow_started"
    );
    self.notifier.notify(ExecutionEvent::WorkflowStarted {
      execution_id: execution_id.clone(),
      workflow_id: workflow.workflow_id.clone(),
    });

    let outcome = self.run_loop(workflow, context, scope, cancel, started).await;
    let (abort, skipped) = match outcome {
      Ok(outcome) => outcome,
      Err(e) => {
        error!(execution_id = %execution_id, error = %e, "workflow_failed");
        self.notifier.notify(ExecutionEvent::WorkflowFailed {
          execution_id,
          error: e.to_string(),
        });
        return Err(e);
      }
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let result = WorkflowResult::build(context, abort.as_ref(), skipped, elapsed_ms);

    if result.success {
      info!(
        execution_id = %execution_id,
        elapsed_ms,
        warnings = result.warnings.len(),
        approval = ?result.approval,
        "workflow_completed"
      );
      self.notifier.notify(ExecutionEvent::WorkflowCompleted {
        execution_id,
        approval_pending: result.is_pending_approval(),
      });
    } else {
      error!(
        execution_id = %execution_id,
        elapsed_ms,
        summary = %result.summary,
        "workflow_failed"
      );
      self.notifier.notify(ExecutionEvent::WorkflowFailed {
        execution_id,
        error: result.summary.clone(),
      });
    }

    Ok(result)
  }

  /// Returns why the run stopped early, if it did, and the skipped steps.
  async fn run_loop<'w>(
    &self,
    workflow: &'w Workflow,
    context: &mut ExecutionContext,
    scope: Vec<&'w StepDef>,
    cancel: &CancellationToken,
    started: Instant,
  ) -> Result<(Option<Abort>, Vec<String>), EngineError> {
    let deadline = workflow
      .timeout_ms
      .map(|ms| (ms, started + Duration::from_millis(ms)));
    let mut pending = scope;
    let mut skipped: HashSet<String> = HashSet::new();
    let mut abort = None;

    // Every iteration runs or skips at least one step.
    let max_iterations = pending.len() + 1;
    for _ in 0..max_iterations {
      if pending.is_empty() {
        break;
      }
      if cancel.is_cancelled() {
        warn!(execution_id = %context.execution_id, "workflow cancelled");
        context.errors.push("workflow cancelled".to_string());
        abort = Some(Abort::Cancelled);
        break;
      }
      if let Some((timeout_ms, deadline)) = deadline {
        if Instant::now() >= deadline {
          context
            .errors
            .push(format!("workflow timed out after {} ms", timeout_ms));
          abort = Some(Abort::TimedOut { timeout_ms });
          break;
        }
      }

      let unfinished: HashSet<&str> = pending.iter().copied().map(|s| s.step_id.as_str()).collect();
      let mut ready = Vec::new();
      let mut still_pending = Vec::new();
      let mut progressed = false;
      for step in pending {
        match self.readiness(workflow, context, step, &unfinished, &skipped) {
          Readiness::Ready => ready.push(step),
          Readiness::Waiting => still_pending.push(step),
          Readiness::Blocked { dependency } => {
            progressed = true;
            let reason = format!("dependency '{}' did not succeed", dependency);
            if !step.optional {
              context
                .errors
                .push(format!("step '{}' could not run: {}", step.step_id, reason));
            }
            self.skip(context, step, &reason);
            skipped.insert(step.step_id.clone());
          }
        }
      }

      if ready.is_empty() {
        if !progressed && !still_pending.is_empty() {
          return Err(EngineError::NoProgress {
            pending: still_pending.iter().map(|s| s.step_id.clone()).collect(),
          });
        }
        pending = still_pending;
        continue;
      }

      // Ready steps beyond the parallelism bound wait for the next wave.
      let overflow = ready.split_off(ready.len().min(workflow.max_parallel));
      let wave = ready;
      pending = merge_in_order(workflow, overflow, still_pending);

      let outcomes = self.run_wave(workflow, context, &wave, cancel).await?;
      for (step, result) in outcomes {
        let failed = !result.is_success();
        let error = result
          .error()
          .map(|e| e.message.clone())
          .unwrap_or_default();
        self.record(workflow, context, step, result);

        if failed && !step.optional && abort.is_none() {
          context
            .errors
            .push(format!("step '{}' failed: {}", step.step_id, error));
          abort = Some(Abort::StepFailed {
            position: workflow.position(&step.step_id).unwrap_or(0),
            name: step.display_name().to_string(),
            error,
          });
        }
      }

      if abort.is_some() {
        break;
      }
    }

    if abort.is_none() && !pending.is_empty() {
      return Err(EngineError::NoProgress {
        pending: pending.iter().map(|s| s.step_id.clone()).collect(),
      });
    }

    for step in &pending {
      self.skip(context, step, "workflow aborted");
      skipped.insert(step.step_id.clone());
    }

    let skipped = workflow
      .steps
      .iter()
      .filter(|s| skipped.contains(&s.step_id))
      .map(|s| s.step_id.clone())
      .collect();
    Ok((abort, skipped))
  }

  fn readiness(
    &self,
    workflow: &Workflow,
    context: &ExecutionContext,
    step: &StepDef,
    unfinished: &HashSet<&str>,
    skipped: &HashSet<String>,
  ) -> Readiness {
    let mut waiting = false;
    for dep in &step.depends_on {
      let dep_optional = workflow.get_step(dep).is_some_and(|d| d.optional);
      match context.result(dep) {
        Some(result) if result.is_success() || dep_optional => continue,
        Some(_) => {
          return Readiness::Blocked {
            dependency: dep.clone(),
          };
        }
        None if unfinished.contains(dep.as_str()) => waiting = true,
        None if skipped.contains(dep) && dep_optional => continue,
        None => {
          return Readiness::Blocked {
            dependency: dep.clone(),
          };
        }
      }
    }
    if waiting {
      Readiness::Waiting
    } else {
      Readiness::Ready
    }
  }

  /// Run one wave concurrently. Results come back in wave order.
  async fn run_wave<'w>(
    &self,
    workflow: &Workflow,
    context: &ExecutionContext,
    wave: &[&'w StepDef],
    cancel: &CancellationToken,
  ) -> Result<Vec<(&'w StepDef, StepResult)>, EngineError> {
    let base = CallContext::new(&context.user_id).with_session(context.session_id.clone());
    let guardrails = (!workflow.guardrails.is_empty()).then(|| workflow.guardrails.clone());

    info!(
      execution_id = %context.execution_id,
      steps = ?wave.iter().map(|s| s.step_id.as_str()).collect::<Vec<_>>(),
      "executing wave"
    );

    let handles: Vec<_> = wave
      .iter()
      .map(|step| {
        let call_context =
          base.for_step(&workflow.workflow_id, &context.execution_id, &step.step_id);
        let params = AgentParams {
          prompt: resolve_prompt(&step.prompt, context),
          overrides: step.overrides.clone(),
          guardrails: guardrails.clone(),
          extra: step.params.clone(),
        };
        let timeout = step
          .overrides
          .timeout_ms
          .or(self.config.step_timeout_ms)
          .map(Duration::from_millis);

        info!(execution_id = %context.execution_id, step_id = %step.step_id, agent_id = %step.agent_id, "step_started");
        self.notifier.notify(ExecutionEvent::StepStarted {
          execution_id: context.execution_id.clone(),
          step_id: step.step_id.clone(),
        });

        let registry = Arc::clone(&self.registry);
        let agent_id = step.agent_id.clone();
        let action = step.action.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
          let started = Instant::now();
          let run = run_with_timeout(
            registry.execute(&agent_id, &action, &call_context, &params),
            timeout,
          );
          let result = tokio::select! {
            result = run => result,
            _ = cancel.cancelled() => StepResult::failed(FailureKind::Cancelled, "workflow cancelled"),
          };
          result.with_duration(started.elapsed().as_millis() as u64)
        })
      })
      .collect();

    let joined = futures::future::join_all(handles).await;

    wave
      .iter()
      .zip(joined)
      .map(|(step, joined)| {
        joined
          .map(|result| (*step, result))
          .map_err(|e| EngineError::TaskJoin {
            step_id: step.step_id.clone(),
            message: e.to_string(),
          })
      })
      .collect()
  }

  /// Apply guardrails to a finished step, then record it.
  fn record(
    &self,
    workflow: &Workflow,
    context: &mut ExecutionContext,
    step: &StepDef,
    mut result: StepResult,
  ) {
    let execution_id = context.execution_id.clone();

    if let Some(content) = self.reviewable_content(step, &result) {
      let check_context = CheckContext {
        user_id: context.user_id.clone(),
        session_id: context.session_id.clone(),
        step_id: Some(step.step_id.clone()),
      };
      let report = self
        .checker
        .check(&content, &workflow.guardrails, &check_context);

      if !report.passed {
        let warning = format!("step '{}' guardrails: {}", step.step_id, report.describe());
        warn!(
          execution_id = %execution_id,
          step_id = %step.step_id,
          violations = %report.describe(),
          require_approval = workflow.guardrails.require_approval,
          "guardrail_flagged"
        );
        self.notifier.notify(ExecutionEvent::GuardrailFlagged {
          execution_id: execution_id.clone(),
          step_id: step.step_id.clone(),
          violations: report.violations.iter().map(|v| v.message.clone()).collect(),
        });
        result.warnings.push(warning.clone());
        context.warnings.push(warning);
        if workflow.guardrails.require_approval {
          context.request_approval();
        }
      }
    }

    match &result.outcome {
      StepOutcome::Succeeded { output } => {
        info!(
          execution_id = %execution_id,
          step_id = %step.step_id,
          duration_ms = result.duration_ms,
          "step_completed"
        );
        self.notifier.notify(ExecutionEvent::StepCompleted {
          execution_id,
          step_id: step.step_id.clone(),
          output: output.to_value(),
        });
      }
      StepOutcome::Failed { error: failure } => {
        warn!(
          execution_id = %execution_id,
          step_id = %step.step_id,
          optional = step.optional,
          kind = ?failure.kind,
          error = %failure.message,
          "step_failed"
        );
        if step.optional {
          context.warnings.push(format!(
            "optional step '{}' failed: {}",
            step.step_id, failure.message
          ));
        }
        self.notifier.notify(ExecutionEvent::StepFailed {
          execution_id,
          step_id: step.step_id.clone(),
          error: failure.message.clone(),
          optional: step.optional,
        });
      }
    }

    context.record(step.step_id.clone(), result);
  }

  /// Content of a successful step whose agent produces content.
  fn reviewable_content(&self, step: &StepDef, result: &StepResult) -> Option<String> {
    let output = result.output()?;
    let agent = self.registry.get(&step.agent_id)?;
    if !agent.produces_content(&step.action) {
      return None;
    }
    output.content()
  }

  fn skip(&self, context: &ExecutionContext, step: &StepDef, reason: &str) {
    info!(
      execution_id = %context.execution_id,
      step_id = %step.step_id,
      reason,
      "step_skipped"
    );
    self.notifier.notify(ExecutionEvent::StepSkipped {
      execution_id: context.execution_id.clone(),
      step_id: step.step_id.clone(),
      reason: reason.to_string(),
    });
  }
}

async fn run_with_timeout(
  run: impl std::future::Future<Output = StepResult>,
  timeout: Option<Duration>,
) -> StepResult {
  match timeout {
    Some(limit) => tokio::time::timeout(limit, run).await.unwrap_or_else(|_| {
      StepResult::failed(
        FailureKind::Timeout,
        format!("step timed out after {} ms", limit.as_millis()),
      )
    }),
    None => run.await,
  }
}

/// Merge two step lists back into declaration order.
fn merge_in_order<'w>(
  workflow: &Workflow,
  a: Vec<&'w StepDef>,
  b: Vec<&'w StepDef>,
) -> Vec<&'w StepDef> {
  let mut merged: Vec<&StepDef> = a.into_iter().chain(b).collect();
  merged.sort_by_key(|s| workflow.position(&s.step_id).unwrap_or(usize::MAX));
  merged
}
