//! Cadence Engine
//!
//! Executes workflow definitions against an [`AgentRegistry`].
//!
//! ```text
//! WorkflowEngine::execute(def, request, cancel)
//!   -> prepare: lock the definition, route every step to an agent
//!   -> loop: ready set -> wave of <= max_parallel steps -> record results
//!   -> WorkflowResult + ExecutionContext
//! ```
//!
//! Each recorded step result feeds later prompts through template tokens
//! (`{{<step_id>.result}}`, `{{userId}}`, `{{sessionId}}`,
//! `{{input.<path>}}`). Output of content-producing agents is checked by the
//! configured [`GuardrailsChecker`](cadence_guardrails::GuardrailsChecker);
//! a failed check is a warning and, when the policy asks for it, parks the
//! run in pending approval.
//!
//! # Usage
//!
//! ```ignore
//! let engine = WorkflowEngine::new(registry, Arc::new(PolicyChecker), EngineConfig::default());
//! let run = engine
//!   .execute(&def, RunRequest::new("user-1"), CancellationToken::new())
//!   .await?;
//! println!("{}", run.result.summary);
//! ```
//!
//! [`AgentRegistry`]: cadence_agent::AgentRegistry

mod context;
mod engine;
mod error;
mod events;
mod result;
mod template;

pub use context::{ApprovalStatus, ExecutionContext, RunRequest};
pub use engine::{WorkflowEngine, WorkflowRun};
pub use error::EngineError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use result::WorkflowResult;
pub use template::resolve_prompt;
