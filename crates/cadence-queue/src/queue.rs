use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use cadence_config::{ExecutionConfig, QueueConfig};
use cadence_model::ModelCaller;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::batch::{BatchExecutionResult, BatchGroup, partition};
use crate::error::QueueError;
use crate::prompt::{PromptHandle, QueuedPrompt};
use crate::stats::{Counters, QueueStats};

/// Whether a flush honors `min_batch_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushKind {
  /// Size or batch-timer triggered. Skipped when another flush is running
  /// or fewer than `min_batch_size` prompts are queued.
  Scheduled,
  /// `flush_now` or the straggler timer. Waits its turn and sends anything.
  Forced,
}

/// Batching prompt queue.
///
/// Cheap to clone; clones share the same queue. Must be used from within a
/// tokio runtime since flushes run on spawned tasks. Dropping the last
/// handle rejects every prompt still queued with [`QueueError::Cancelled`].
#[derive(Clone)]
pub struct PromptQueue {
  inner: Arc<QueueInner>,
}

struct QueueInner {
  config: QueueConfig,
  caller: Arc<dyn ModelCaller>,
  state: Mutex<QueueState>,
  flush_lock: tokio::sync::Mutex<()>,
  counters: Counters,
}

#[derive(Default)]
struct QueueState {
  pending: VecDeque<QueuedPrompt>,
  batch_timer: Option<JoinHandle<()>>,
  straggler_timer: Option<JoinHandle<()>>,
}

impl PromptQueue {
  /// Invalid batch bounds are clamped: `min_batch_size` to at least 1 and
  /// `max_batch_size` to at least `min_batch_size`.
  pub fn new(config: QueueConfig, caller: Arc<dyn ModelCaller>) -> Self {
    Self {
      inner: Arc::new(QueueInner {
        config: clamp_bounds(config),
        caller,
        state: Mutex::new(QueueState::default()),
        flush_lock: tokio::sync::Mutex::new(()),
        counters: Counters::default(),
      }),
    }
  }

  pub fn config(&self) -> &QueueConfig {
    &self.inner.config
  }

  /// Append a prompt and return a handle resolving to its response.
  ///
  /// Tags are carried for observability only and never affect grouping.
  pub fn enqueue(
    &self,
    prompt: impl Into<String>,
    tags: Vec<String>,
    config: ExecutionConfig,
  ) -> PromptHandle {
    let (queued, handle) = QueuedPrompt::new(prompt.into(), tags, config);
    Counters::bump(&self.inner.counters.enqueued);

    let mut state = self.inner.lock_state();
    let was_empty = state.pending.is_empty();
    debug!(
      prompt_id = %queued.id,
      tags = ?queued.tags,
      model = %queued.config.model,
      depth = state.pending.len() + 1,
      "prompt_enqueued"
    );
    state.pending.push_back(queued);

    if was_empty {
      self.inner.restart_straggler_timer(&mut state);
    }
    self.inner.schedule(&mut state);

    handle
  }

  /// Flush up to `max_batch_size` prompts regardless of `min_batch_size`.
  ///
  /// Waits for a running flush to finish first. Returns `None` when the
  /// queue is empty.
  pub async fn flush_now(&self) -> Option<BatchExecutionResult> {
    self.inner.flush(FlushKind::Forced).await
  }

  pub fn depth(&self) -> usize {
    self.inner.lock_state().pending.len()
  }

  /// Reject every queued prompt with [`QueueError::Cancelled`] and stop all
  /// timers. Prompts already handed to a flush are unaffected.
  pub fn clear(&self) -> usize {
    let drained: Vec<QueuedPrompt> = {
      let mut state = self.inner.lock_state();
      state.abort_timers();
      state.pending.drain(..).collect()
    };

    let count = drained.len();
    Counters::add(&self.inner.counters.cancelled, count as u64);
    for prompt in drained {
      prompt.resolve(Err(QueueError::Cancelled));
    }
    if count > 0 {
      info!(cancelled = count, "queue_cleared");
    }
    count
  }

  pub fn stats(&self) -> QueueStats {
    self.inner.counters.snapshot(self.depth())
  }
}

impl QueueInner {
  fn lock_state(&self) -> MutexGuard<'_, QueueState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Arm whatever the current depth calls for. Never flushes inline.
  fn schedule(self: &Arc<Self>, state: &mut QueueState) {
    let depth = state.pending.len();
    if depth >= self.config.max_batch_size {
      let inner = Arc::clone(self);
      tokio::spawn(async move {
        inner.flush(FlushKind::Scheduled).await;
      });
    } else if depth >= self.config.min_batch_size && state.batch_timer.is_none() {
      state.batch_timer = Some(self.spawn_timer(self.config.max_batch_wait(), TimerSlot::Batch));
    }
  }

  fn restart_straggler_timer(self: &Arc<Self>, state: &mut QueueState) {
    if let Some(timer) = state.straggler_timer.take() {
      timer.abort();
    }
    if let Some(timeout) = self.config.straggler_timeout() {
      state.straggler_timer = Some(self.spawn_timer(timeout, TimerSlot::Straggler));
    }
  }

  /// Timers hold a weak reference so a pending timer never keeps a dropped
  /// queue alive.
  fn spawn_timer(self: &Arc<Self>, wait: Duration, slot: TimerSlot) -> JoinHandle<()> {
    let weak: Weak<Self> = Arc::downgrade(self);
    tokio::spawn(async move {
      tokio::time::sleep(wait).await;
      let Some(inner) = weak.upgrade() else {
        return;
      };

      // Vacate the slot first so a later abort cannot hit a running flush.
      let kind = {
        let mut state = inner.lock_state();
        match slot {
          TimerSlot::Batch => {
            state.batch_timer = None;
            FlushKind::Scheduled
          }
          TimerSlot::Straggler => {
            state.straggler_timer = None;
            FlushKind::Forced
          }
        }
      };
      inner.flush(kind).await;
    })
  }

  async fn flush(self: &Arc<Self>, kind: FlushKind) -> Option<BatchExecutionResult> {
    let result = {
      let _guard = match kind {
        FlushKind::Scheduled => match self.flush_lock.try_lock() {
          Ok(guard) => guard,
          // The running flush re-arms on completion.
          Err(_) => return None,
        },
        FlushKind::Forced => self.flush_lock.lock().await,
      };

      let batch = {
        let mut state = self.lock_state();
        let depth = state.pending.len();
        if depth == 0 || (kind == FlushKind::Scheduled && depth < self.config.min_batch_size) {
          None
        } else {
          let take = depth.min(self.config.max_batch_size);
          Some(state.pending.drain(..take).collect::<Vec<_>>())
        }
      };

      match batch {
        Some(batch) => Some(self.execute_batch(batch, kind).await),
        None => {
          debug!(?kind, "flush skipped, batch below minimum");
          None
        }
      }
    };

    // Re-arm only after the flush lock is released.
    let mut state = self.lock_state();
    if state.pending.is_empty() {
      if let Some(timer) = state.straggler_timer.take() {
        timer.abort();
      }
    } else if result.is_some() {
      self.restart_straggler_timer(&mut state);
    }
    self.schedule(&mut state);

    result
  }

  async fn execute_batch(&self, batch: Vec<QueuedPrompt>, kind: FlushKind) -> BatchExecutionResult {
    let started = Instant::now();
    let batch_id = uuid::Uuid::new_v4().to_string();
    let prompt_count = batch.len();
    let groups = partition(batch);
    let group_count = groups.len();
    Counters::bump(&self.counters.flushes);

    // Upstream calls run on their own tasks so a panicking caller still
    // leaves us holding every responder.
    let calls: Vec<_> = groups
      .iter()
      .map(|group| {
        let caller = Arc::clone(&self.caller);
        let request = group.request();
        Counters::bump(&self.counters.upstream_calls);
        tokio::spawn(async move { caller.call(request).await })
      })
      .collect();
    let responses = futures::future::join_all(calls).await;

    let mut succeeded = 0;
    let mut failed = 0;
    for (group, response) in groups.into_iter().zip(responses) {
      let outcome = match response {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(QueueError::from(e)),
        Err(e) => Err(QueueError::BatchExecution {
          message: format!("upstream task join error: {}", e),
        }),
      };
      match outcome {
        Ok(text) => succeeded += self.resolve_group(group, text),
        Err(e) => failed += self.reject_group(&batch_id, group, e),
      }
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    info!(
      batch_id = %batch_id,
      ?kind,
      prompt_count,
      group_count,
      succeeded,
      failed,
      duration_ms,
      "batch_flushed"
    );

    BatchExecutionResult {
      batch_id,
      prompt_count,
      group_count,
      succeeded,
      failed,
      duration_ms,
    }
  }

  fn resolve_group(&self, group: BatchGroup, response: String) -> usize {
    let size = group.len();
    let sections = group.split(response);
    // Counters first, so a caller woken by its handle sees them.
    Counters::add(&self.counters.resolved, size as u64);
    for (prompt, section) in group.prompts.into_iter().zip(sections) {
      debug!(
        prompt_id = %prompt.id,
        waited_ms = prompt.enqueued_at.elapsed().as_millis() as u64,
        empty = section.is_empty(),
        "prompt_resolved"
      );
      prompt.resolve(Ok(section));
    }
    size
  }

  fn reject_group(&self, batch_id: &str, group: BatchGroup, error: QueueError) -> usize {
    let size = group.len();
    warn!(
      batch_id = %batch_id,
      group_size = size,
      model = %group.config.model,
      error = %error,
      "group_failed"
    );
    Counters::add(&self.counters.failed, size as u64);
    for prompt in group.prompts {
      prompt.resolve(Err(error.clone()));
    }
    size
  }
}

impl QueueState {
  fn abort_timers(&mut self) {
    if let Some(timer) = self.batch_timer.take() {
      timer.abort();
    }
    if let Some(timer) = self.straggler_timer.take() {
      timer.abort();
    }
  }
}

impl Drop for QueueInner {
  fn drop(&mut self) {
    let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
    state.abort_timers();
    let count = state.pending.len();
    for prompt in state.pending.drain(..) {
      prompt.resolve(Err(QueueError::Cancelled));
    }
    if count > 0 {
      debug!(cancelled = count, "queue dropped with pending prompts");
    }
  }
}

fn clamp_bounds(mut config: QueueConfig) -> QueueConfig {
  if let Err(e) = config.validate() {
    config.min_batch_size = config.min_batch_size.max(1);
    config.max_batch_size = config.max_batch_size.max(config.min_batch_size);
    warn!(
      error = %e,
      min_batch_size = config.min_batch_size,
      max_batch_size = config.max_batch_size,
      "queue config clamped"
    );
  }
  config
}

#[derive(Debug, Clone, Copy)]
enum TimerSlot {
  Batch,
  Straggler,
}
