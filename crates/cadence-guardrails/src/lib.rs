//! Cadence Guardrails
//!
//! The [`GuardrailsChecker`] trait is what the agent middleware and the
//! workflow engine consume. [`PolicyChecker`] is a small phrase and length
//! checker good enough for local runs; production deployments are expected
//! to plug in their own.

mod checker;
mod policy;

pub use checker::{CheckContext, GuardrailReport, GuardrailsChecker, Violation, ViolationKind};
pub use policy::PolicyChecker;
