use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cadence_config::{ExecutionConfig, QueueConfig};
use cadence_model::{ModelCaller, ModelError, ModelRequest};
use cadence_queue::{PromptQueue, QueueError, RESPONSE_SEPARATOR};
use tokio::sync::Semaphore;

type Responder = Box<dyn Fn(&ModelRequest) -> Result<String, ModelError> + Send + Sync>;

/// Records every request and answers with a scripted responder.
struct ScriptedCaller {
  requests: Mutex<Vec<ModelRequest>>,
  respond: Responder,
}

impl ScriptedCaller {
  fn new(respond: impl Fn(&ModelRequest) -> Result<String, ModelError> + Send + Sync + 'static) -> Arc<Self> {
    Arc::new(Self {
      requests: Mutex::new(Vec::new()),
      respond: Box::new(respond),
    })
  }

  fn echo() -> Arc<Self> {
    Self::new(echo)
  }

  fn calls(&self) -> usize {
    self.requests.lock().unwrap().len()
  }

  fn requests(&self) -> Vec<ModelRequest> {
    self.requests.lock().unwrap().clone()
  }
}

#[async_trait]
impl ModelCaller for ScriptedCaller {
  async fn call(&self, request: ModelRequest) -> Result<String, ModelError> {
    let response = (self.respond)(&request);
    self.requests.lock().unwrap().push(request);
    response
  }
}

/// Answer every framed request with `echo:<request text>`.
fn echo(request: &ModelRequest) -> Result<String, ModelError> {
  let content = &request.messages.last().unwrap().content;
  let parts: Vec<&str> = content.split("=== REQUEST ").skip(1).collect();
  if parts.is_empty() {
    return Ok(format!("echo:{}", content));
  }
  let answers: Vec<String> = parts
    .iter()
    .enumerate()
    .map(|(i, part)| {
      let body = part.split_once("===").map(|(_, b)| b.trim()).unwrap_or("");
      format!("RESPONSE {}: echo:{}", i + 1, body)
    })
    .collect();
  Ok(answers.join(&format!("\n{}\n", RESPONSE_SEPARATOR)))
}

fn framed_count(request: &ModelRequest) -> usize {
  let count = request.messages.last().unwrap().content.matches("=== REQUEST ").count();
  count.max(1)
}

fn queue_config(min: usize, max: usize, wait_ms: u64, straggler_ms: Option<u64>) -> QueueConfig {
  QueueConfig {
    min_batch_size: min,
    max_batch_size: max,
    max_batch_wait_ms: wait_ms,
    straggler_timeout_ms: straggler_ms,
  }
}

async fn within<F: std::future::Future>(future: F) -> F::Output {
  tokio::time::timeout(Duration::from_secs(5), future)
    .await
    .expect("timed out waiting for the queue")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_identical_configs_share_one_call() {
  let caller = ScriptedCaller::echo();
  let queue = PromptQueue::new(queue_config(2, 10, 50, None), caller.clone());
  let config = ExecutionConfig::new("gpt-4o-mini").with_temperature(0.3);

  let handles: Vec<_> = (0..3)
    .map(|i| queue.enqueue(format!("p{}", i), vec![], config.clone()))
    .collect();
  let results = within(futures::future::join_all(handles)).await;

  let texts: Vec<String> = results.into_iter().map(|r| r.unwrap()).collect();
  assert_eq!(texts, vec!["echo:p0", "echo:p1", "echo:p2"]);
  assert_eq!(caller.calls(), 1);
  assert_eq!(framed_count(&caller.requests()[0]), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_different_temperatures_make_separate_calls() {
  let caller = ScriptedCaller::echo();
  let queue = PromptQueue::new(queue_config(3, 10, 50, None), caller.clone());
  let cold = ExecutionConfig::new("m").with_temperature(0.2);
  let hot = ExecutionConfig::new("m").with_temperature(0.9);

  let a = queue.enqueue("a", vec![], cold.clone());
  let b = queue.enqueue("b", vec![], hot);
  let c = queue.enqueue("c", vec![], cold);
  let (a, b, c) = within(async { tokio::join!(a, b, c) }).await;

  assert_eq!(a.unwrap(), "echo:a");
  assert_eq!(b.unwrap(), "echo:b");
  assert_eq!(c.unwrap(), "echo:c");
  assert_eq!(caller.calls(), 2);

  let mut temperatures: Vec<f32> = caller.requests().iter().map(|r| r.temperature).collect();
  temperatures.sort_by(|x, y| x.partial_cmp(y).unwrap());
  assert_eq!(temperatures, vec![0.2, 0.9]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_max_batch_size_flushes_without_waiting() {
  let caller = ScriptedCaller::echo();
  let queue = PromptQueue::new(queue_config(2, 3, 60_000, None), caller.clone());
  let config = ExecutionConfig::new("m");

  let handles: Vec<_> = (0..3)
    .map(|i| queue.enqueue(format!("p{}", i), vec![], config.clone()))
    .collect();
  let results = tokio::time::timeout(Duration::from_secs(2), futures::future::join_all(handles))
    .await
    .expect("a full batch should flush immediately");

  assert!(results.iter().all(|r| r.is_ok()));
  assert_eq!(caller.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overflow_drains_in_bounded_batches() {
  let caller = ScriptedCaller::echo();
  let queue = PromptQueue::new(queue_config(2, 2, 20, Some(150)), caller.clone());
  let config = ExecutionConfig::new("m");

  let handles: Vec<_> = (0..5)
    .map(|i| queue.enqueue(format!("p{}", i), vec![], config.clone()))
    .collect();
  let results = within(futures::future::join_all(handles)).await;

  for (i, result) in results.into_iter().enumerate() {
    assert_eq!(result.unwrap(), format!("echo:p{}", i));
  }
  assert!(caller.requests().iter().all(|r| framed_count(r) <= 2));
  assert_eq!(queue.depth(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_below_min_is_not_flushed_by_timer() {
  let caller = ScriptedCaller::echo();
  let queue = PromptQueue::new(queue_config(2, 10, 20, None), caller.clone());

  let handle = queue.enqueue("lonely", vec![], ExecutionConfig::new("m"));
  tokio::time::sleep(Duration::from_millis(150)).await;
  assert_eq!(queue.depth(), 1);
  assert_eq!(caller.calls(), 0);

  let result = queue.flush_now().await.expect("one prompt was queued");
  assert_eq!(result.prompt_count, 1);
  assert_eq!(result.group_count, 1);
  assert_eq!(handle.await.unwrap(), "echo:lonely");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_straggler_timer_forces_flush() {
  let caller = ScriptedCaller::echo();
  let queue = PromptQueue::new(queue_config(3, 10, 20, Some(100)), caller.clone());

  let handle = queue.enqueue("straggler", vec!["step:s1".to_string()], ExecutionConfig::new("m"));
  assert_eq!(within(handle).await.unwrap(), "echo:straggler");
  assert_eq!(caller.calls(), 1);
}

#[tokio::test]
async fn test_flush_now_on_empty_queue() {
  let queue = PromptQueue::new(QueueConfig::default(), ScriptedCaller::echo());
  assert!(queue.flush_now().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_short_response_pads_with_empty_strings() {
  let caller = ScriptedCaller::new(|_| Ok("RESPONSE 1: only one".to_string()));
  let queue = PromptQueue::new(queue_config(3, 10, 20, None), caller.clone());
  let config = ExecutionConfig::new("m");

  let handles: Vec<_> = (0..3)
    .map(|i| queue.enqueue(format!("p{}", i), vec![], config.clone()))
    .collect();
  let texts: Vec<String> = within(futures::future::join_all(handles))
    .await
    .into_iter()
    .map(|r| r.unwrap())
    .collect();

  assert_eq!(texts, vec!["only one", "", ""]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upstream_failure_rejects_whole_group() {
  let caller = ScriptedCaller::new(|request| {
    if request.temperature > 0.5 {
      Err(ModelError::Status {
        status: 500,
        body: "boom".to_string(),
      })
    } else {
      echo(request)
    }
  });
  let queue = PromptQueue::new(queue_config(4, 10, 20, None), caller.clone());
  let cold = ExecutionConfig::new("m").with_temperature(0.1);
  let hot = ExecutionConfig::new("m").with_temperature(0.9);

  let h1 = queue.enqueue("h1", vec![], hot.clone());
  let c1 = queue.enqueue("c1", vec![], cold.clone());
  let h2 = queue.enqueue("h2", vec![], hot);
  let c2 = queue.enqueue("c2", vec![], cold);
  let (h1, c1, h2, c2) = within(async { tokio::join!(h1, c1, h2, c2) }).await;

  for rejected in [h1, h2] {
    match rejected {
      Err(QueueError::Upstream { source }) => {
        assert!(matches!(*source, ModelError::Status { status: 500, .. }));
      }
      other => panic!("expected upstream error, got {:?}", other),
    }
  }
  assert_eq!(c1.unwrap(), "echo:c1");
  assert_eq!(c2.unwrap(), "echo:c2");

  let stats = queue.stats();
  assert_eq!(stats.failed, 2);
  assert_eq!(stats.resolved, 2);
  assert_eq!(stats.upstream_calls, 2);
}

#[tokio::test]
async fn test_clear_cancels_pending_prompts() {
  let caller = ScriptedCaller::echo();
  let queue = PromptQueue::new(queue_config(5, 10, 20, None), caller.clone());
  let config = ExecutionConfig::new("m");

  let a = queue.enqueue("a", vec![], config.clone());
  let b = queue.enqueue("b", vec![], config);
  assert_eq!(queue.clear(), 2);
  assert_eq!(queue.depth(), 0);

  assert!(matches!(a.await, Err(QueueError::Cancelled)));
  assert!(matches!(b.await, Err(QueueError::Cancelled)));
  assert_eq!(queue.stats().cancelled, 2);
  assert_eq!(caller.calls(), 0);
}

#[tokio::test]
async fn test_dropping_queue_cancels_pending_prompts() {
  let queue = PromptQueue::new(queue_config(5, 10, 20, Some(50)), ScriptedCaller::echo());
  let handle = queue.enqueue("orphan", vec![], ExecutionConfig::new("m"));
  drop(queue);

  assert!(matches!(handle.await, Err(QueueError::Cancelled)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stats_after_flush() {
  let caller = ScriptedCaller::echo();
  let queue = PromptQueue::new(queue_config(2, 10, 20, None), caller);
  let config = ExecutionConfig::new("m");

  let handles: Vec<_> = (0..3)
    .map(|i| queue.enqueue(format!("p{}", i), vec![], config.clone()))
    .collect();
  within(futures::future::join_all(handles)).await;

  let stats = queue.stats();
  assert_eq!(stats.enqueued, 3);
  assert_eq!(stats.flushes, 1);
  assert_eq!(stats.upstream_calls, 1);
  assert_eq!(stats.resolved, 3);
  assert_eq!(stats.depth, 0);
}

/// Answers like a JSON-mode endpoint: always exactly one JSON object.
fn json_mode(request: &ModelRequest) -> Result<String, ModelError> {
  assert!(request.structured_output);
  let content = &request.messages.last().unwrap().content;
  let count = content.matches("=== REQUEST ").count();
  if count == 0 {
    return Ok(r#"{"title":"single"}"#.to_string());
  }
  let responses: Vec<serde_json::Value> = (1..=count)
    .map(|k| serde_json::json!({ "title": format!("post {}", k) }))
    .collect();
  Ok(serde_json::json!({ "responses": responses }).to_string())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_structured_group_splits_json_responses() {
  let caller = ScriptedCaller::new(json_mode);
  let queue = PromptQueue::new(queue_config(2, 10, 20, None), caller.clone());
  let config = ExecutionConfig::new("m").structured(true);

  let a = queue.enqueue("schedule a", vec![], config.clone());
  let b = queue.enqueue("schedule b", vec![], config);
  let (a, b) = within(async { tokio::join!(a, b) }).await;

  assert_eq!(a.unwrap(), r#"{"title":"post 1"}"#);
  assert_eq!(b.unwrap(), r#"{"title":"post 2"}"#);
  assert_eq!(caller.calls(), 1);
  assert!(
    !caller.requests()[0].messages[0]
      .content
      .contains(RESPONSE_SEPARATOR)
  );
}

/// Counts calls on entry, then blocks until the gate hands out a permit.
struct GatedCaller {
  calls: AtomicUsize,
  gate: Semaphore,
}

#[async_trait]
impl ModelCaller for GatedCaller {
  async fn call(&self, request: ModelRequest) -> Result<String, ModelError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let permit = self
      .gate
      .acquire()
      .await
      .map_err(|_| ModelError::invalid_response("gate closed"))?;
    permit.forget();
    echo(&request)
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_queue_waits_for_running_flush() {
  let caller = Arc::new(GatedCaller {
    calls: AtomicUsize::new(0),
    gate: Semaphore::new(0),
  });
  let queue = PromptQueue::new(queue_config(2, 2, 60_000, None), caller.clone());
  let config = ExecutionConfig::new("m");

  let a = queue.enqueue("a", vec![], config.clone());
  let forced = tokio::spawn({
    let queue = queue.clone();
    async move { queue.flush_now().await }
  });
  within(async {
    while caller.calls.load(Ordering::SeqCst) == 0 {
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
  })
  .await;

  // Reaching max_batch_size while a flush is running must not start another.
  let b = queue.enqueue("b", vec![], config.clone());
  let c = queue.enqueue("c", vec![], config);
  tokio::time::sleep(Duration::from_millis(100)).await;
  assert_eq!(caller.calls.load(Ordering::SeqCst), 1);
  assert_eq!(queue.depth(), 2);

  caller.gate.add_permits(10);
  let flushed = within(forced).await.unwrap().expect("forced flush sends the lone prompt");
  assert_eq!(flushed.prompt_count, 1);
  assert_eq!(within(a).await.unwrap(), "echo:a");

  // The finished flush re-arms and drains the full batch.
  let (b, c) = within(async { tokio::join!(b, c) }).await;
  assert_eq!(b.unwrap(), "echo:b");
  assert_eq!(c.unwrap(), "echo:c");
  assert_eq!(caller.calls.load(Ordering::SeqCst), 2);
  assert_eq!(queue.depth(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_batch_bounds_are_clamped() {
  let caller = ScriptedCaller::echo();
  let queue = PromptQueue::new(queue_config(0, 0, 20, None), caller.clone());
  assert_eq!(queue.config().min_batch_size, 1);
  assert_eq!(queue.config().max_batch_size, 1);

  let handle = queue.enqueue("a", vec![], ExecutionConfig::new("m"));
  assert_eq!(within(handle).await.unwrap(), "echo:a");
  tokio::time::sleep(Duration::from_millis(50)).await;
  assert_eq!(caller.calls(), 1);
  assert_eq!(queue.stats().flushes, 1);
}
