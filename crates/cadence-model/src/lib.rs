//! Cadence Model
//!
//! The only network boundary of cadence. Everything that talks to a language
//! model goes through the [`ModelCaller`] trait; callers never know whether
//! they share an upstream request with other prompts.
//!
//! [`HttpModelCaller`] talks to any OpenAI-compatible chat completions
//! endpoint. Tests and embedders can provide their own implementation.

mod caller;
mod error;
mod http;
mod types;

pub use caller::ModelCaller;
pub use error::ModelError;
pub use http::HttpModelCaller;
pub use types::{Message, ModelRequest, Role};
