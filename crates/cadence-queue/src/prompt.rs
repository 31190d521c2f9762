use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use cadence_config::ExecutionConfig;
use tokio::sync::oneshot;

use crate::error::QueueError;

pub(crate) type PromptResult = Result<String, QueueError>;

/// A prompt waiting in the queue. Its responder is consumed exactly once.
#[derive(Debug)]
pub(crate) struct QueuedPrompt {
  pub id: String,
  pub prompt: String,
  pub tags: Vec<String>,
  pub config: ExecutionConfig,
  pub enqueued_at: Instant,
  responder: oneshot::Sender<PromptResult>,
}

impl QueuedPrompt {
  pub fn new(
    prompt: String,
    tags: Vec<String>,
    config: ExecutionConfig,
  ) -> (Self, PromptHandle) {
    let (responder, receiver) = oneshot::channel();
    let id = uuid::Uuid::new_v4().to_string();
    let queued = Self {
      id: id.clone(),
      prompt,
      tags,
      config,
      enqueued_at: Instant::now(),
      responder,
    };
    (queued, PromptHandle { id, receiver })
  }

  /// Deliver the result. Returns false when the caller stopped waiting.
  pub fn resolve(self, result: PromptResult) -> bool {
    self.responder.send(result).is_ok()
  }
}

/// Resolves to the prompt's own section of the batched response.
///
/// Dropping the handle does not remove the prompt from the queue; the
/// prompt still counts towards its batch.
#[derive(Debug)]
pub struct PromptHandle {
  id: String,
  receiver: oneshot::Receiver<PromptResult>,
}

impl PromptHandle {
  pub fn id(&self) -> &str {
    &self.id
  }
}

impl Future for PromptHandle {
  type Output = Result<String, QueueError>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    // A dropped responder means the queue went away without answering.
    Pin::new(&mut self.receiver)
      .poll(cx)
      .map(|received| received.unwrap_or(Err(QueueError::Cancelled)))
  }
}
