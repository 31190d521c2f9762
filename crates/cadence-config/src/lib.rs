//! Cadence Config
//!
//! This crate contains the serializable configuration types for cadence.
//! These types describe workflows, queue tuning and agent wiring before they
//! are validated and handed to the runtime crates.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI with `--config=cadence.json`)
//! - Embedding applications (constructed directly in code)
//!
//! Workflow definitions are locked by `cadence-workflow`, which checks the
//! dependency graph before anything executes.

mod agent;
mod enums;
mod error;
mod execution;
mod guardrails;
mod runtime;
mod workflow;

pub use agent::{AgentDef, builtin_agents};
pub use enums::{AgentKind, ExecutionMode};
pub use error::ConfigError;
pub use execution::ExecutionConfig;
pub use guardrails::GuardrailPolicy;
pub use runtime::{CadenceConfig, DispatchConfig, EngineConfig, ModelEndpointConfig, QueueConfig};
pub use workflow::{StepDef, StepOverrides, WorkflowDef};
