//! Cadence Queue
//!
//! An in-memory prompt queue that merges compatible prompts into a single
//! upstream model call and hands each caller back its own slice of the
//! response.
//!
//! # Flush triggers
//!
//! - depth reaches `max_batch_size`: flush right away
//! - depth reaches `min_batch_size`: flush after `max_batch_wait_ms`
//! - first prompt into an empty queue: forced flush after
//!   `straggler_timeout_ms`, so a queue that never fills still drains
//! - [`PromptQueue::flush_now`]: forced flush on demand
//!
//! Scheduled flushes never send fewer than `min_batch_size` prompts; forced
//! flushes send whatever is queued.
//!
//! # Splitting
//!
//! A group of N prompts is sent as one request asking for N sections joined
//! by [`RESPONSE_SEPARATOR`]. The split is positional and best effort: a
//! model that echoes the separator inside an answer will shift every later
//! answer by one.

mod batch;
mod error;
mod prompt;
mod queue;
mod stats;

pub use batch::{BatchExecutionResult, RESPONSE_SEPARATOR};
pub use error::QueueError;
pub use prompt::PromptHandle;
pub use queue::PromptQueue;
pub use stats::QueueStats;
