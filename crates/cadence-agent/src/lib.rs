//! Cadence Agent
//!
//! Agents turn a workflow step (an action plus a resolved prompt) into a
//! [`StepResult`]. Specialist agents do this by sending prompts through a
//! middleware [`Pipeline`] that ends in the [`Dispatcher`], which either
//! queues the prompt for batching or calls the model directly.
//!
//! ```text
//! AgentRegistry::execute
//!   -> Agent::execute
//!     -> GuardrailsMiddleware        reject unsafe prompts before any call
//!     -> WorkflowContextMiddleware   tag prompts with workflow/step ids
//!     -> ExecutionModeMiddleware     immediate or batched
//!     -> Dispatcher                  PromptQueue or ModelCaller
//! ```

mod agent;
mod context;
mod dispatch;
mod error;
mod middleware;
mod mode;
mod output;
mod registry;
mod result;
mod specialist;

pub use agent::Agent;
pub use context::{AgentParams, CallContext};
pub use dispatch::{DispatchOptions, Dispatcher, PromptRequest};
pub use error::AgentError;
pub use middleware::{
  ExecutionModeMiddleware, GuardrailsMiddleware, Middleware, Next, Pipeline,
  WorkflowContextMiddleware,
};
pub use mode::select_execution_mode;
pub use output::{DraftContent, ResearchNotes, ScheduleRecord, StepOutput};
pub use registry::AgentRegistry;
pub use result::{FailureKind, StepFailure, StepOutcome, StepResult};
pub use specialist::SpecialistAgent;
