use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
  pub enqueued: u64,
  pub flushes: u64,
  pub upstream_calls: u64,
  pub resolved: u64,
  pub failed: u64,
  pub cancelled: u64,
  pub depth: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
  pub enqueued: AtomicU64,
  pub flushes: AtomicU64,
  pub upstream_calls: AtomicU64,
  pub resolved: AtomicU64,
  pub failed: AtomicU64,
  pub cancelled: AtomicU64,
}

impl Counters {
  pub fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  pub fn add(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
  }

  pub fn snapshot(&self, depth: usize) -> QueueStats {
    QueueStats {
      enqueued: self.enqueued.load(Ordering::Relaxed),
      flushes: self.flushes.load(Ordering::Relaxed),
      upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
      resolved: self.resolved.load(Ordering::Relaxed),
      failed: self.failed.load(Ordering::Relaxed),
      cancelled: self.cancelled.load(Ordering::Relaxed),
      depth,
    }
  }
}
