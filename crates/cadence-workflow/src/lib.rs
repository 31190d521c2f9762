//! Cadence Workflow
//!
//! This crate provides the "locked" workflow representation for cadence.
//! A locked workflow is a validated form of a `WorkflowDef` that is ready
//! for execution.
//!
//! Key differences from `cadence-config`:
//! - Step ids are unique and non-empty
//! - Every dependency names a declared step
//! - The dependency graph is acyclic

mod error;
mod graph;
mod workflow;

pub use error::WorkflowError;
pub use workflow::Workflow;
