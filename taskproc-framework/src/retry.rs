/// Retrying executor
///
/// [`RetryingExecutor`] composes over any [`TaskExecutor`] and
/// automatically resubmits tasks whose terminal events match a retry
/// predicate, up to a configurable budget. Consumers see one stable
/// identity across attempts plus a `RetryingExecutor/tries` annotation.
///
/// # Identity scheme
///
/// Attempt K of a task runs with its uuid rewritten to
/// `<uuid>-retry<K>` (K starts at 1), so every downstream identifier
/// carries the attempt tag. The retry loop strips the tag before
/// republishing, which is what keeps identities stable for consumers.
///
/// # Attempt bookkeeping
///
/// `task_retries` maps the *original* task id to the current attempt
/// number, or `-1` once the caller killed the task. The sentinel keeps
/// later terminal events flowing to consumers while making the retry
/// path refuse to resubmit.
///
/// # Worker
///
/// A single loop drains the upstream queue, discards events from
/// abandoned attempts, rewrites identities, decides retry vs.
/// pass-through, and republishes onto its own queue. The loop polls
/// non-blockingly and naps between drains so `stop` is observed
/// promptly.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use taskproc_shared::executor::TaskExecutor;
use taskproc_shared::models::event::{Event, EventKind};
use taskproc_shared::models::task_config::TaskConfig;
use taskproc_shared::queue::EventQueue;
use taskproc_shared::task_id;

/// Extension key carrying the attempt counter, `<current>/<max>`
pub const RETRY_TRIES_KEY: &str = "RetryingExecutor/tries";

/// Decides whether a terminal event triggers a retry
pub type RetryPredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Retry budget and loop tuning
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts per task
    pub retries: i32,

    /// Nap between queue drains
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 3,
            poll_interval: Duration::from_secs(1),
        }
    }
}

struct RetryInner {
    executor: Arc<dyn TaskExecutor>,
    retries: i32,
    retry_pred: RetryPredicate,
    poll_interval: Duration,
    task_retries: Mutex<HashMap<String, i32>>,
    src_queue: EventQueue,
    dest_queue: EventQueue,
    stopping: CancellationToken,
}

impl RetryInner {
    /// Submits a task under its current attempt tag, initializing the
    /// attempt counter on first submission
    async fn submit(&self, task_config: TaskConfig) {
        let original_id = task_config.task_id();
        let attempt = {
            let mut retries = self
                .task_retries
                .lock()
                .expect("task retries lock poisoned");
            *retries.entry(original_id).or_insert(1)
        };

        let tagged = task_config.with_uuid(task_id::with_retry_suffix(&task_config.uuid, attempt));
        self.executor.run(tagged).await;
    }

    /// Initiates a retry for a matching terminal event
    ///
    /// Returns true only when a fresh attempt was actually submitted;
    /// the caller suppresses republication of the failure in that case.
    /// The attempt counter is incremented before the resubmission.
    async fn retry(&self, event: &Event) -> bool {
        let current = {
            let retries = self
                .task_retries
                .lock()
                .expect("task retries lock poisoned");
            retries.get(&event.task_id).copied()
        };
        let Some(current) = current else {
            return false;
        };

        // -1 marks a caller kill; the budget check covers exhaustion.
        if current == -1 || current >= self.retries {
            return false;
        }

        let Some(task_config) = event.task_config.clone() else {
            tracing::warn!(
                task_id = %event.task_id,
                "Terminal event carries no task config, cannot retry"
            );
            return false;
        };

        tracing::info!(
            task_id = %event.task_id,
            attempt = current + 1,
            max = self.retries,
            platform_type = %event.platform_type,
            "Retrying task"
        );

        {
            let mut retries = self
                .task_retries
                .lock()
                .expect("task retries lock poisoned");
            retries.insert(event.task_id.clone(), current + 1);
        }
        self.submit(task_config).await;

        true
    }

    /// Rewrites an event's identity back to the original task id
    fn restore_identity(&self, event: Event, original_task_id: &str) -> Event {
        let restored_config = event.task_config.as_ref().map(|config| {
            let base_uuid = task_id::strip_retry_suffix(&config.uuid)
                .map(|(base, _)| base)
                .unwrap_or_else(|| config.uuid.clone());
            config.with_uuid(base_uuid)
        });

        let event = match restored_config {
            Some(config) => event.with_task_config(config),
            None => event,
        };
        event.with_task_id(original_task_id)
    }

    async fn process_event(&self, event: Event) {
        let Some((original_task_id, attempt)) = task_id::strip_retry_suffix(&event.task_id) else {
            // Not attempt-tagged; nothing of ours to rewrite.
            self.dest_queue.push(event);
            return;
        };

        let stored = {
            let retries = self
                .task_retries
                .lock()
                .expect("task retries lock poisoned");
            retries.get(&original_task_id).copied()
        };
        let Some(stored) = stored else {
            tracing::debug!(
                task_id = %original_task_id,
                "Event for task with no attempt record, dropping"
            );
            return;
        };

        // Late updates from abandoned attempts are discarded. Killed
        // tasks (sentinel -1) keep flowing so callers learn the task
        // ended.
        if stored != -1 && attempt != stored {
            tracing::debug!(
                task_id = %original_task_id,
                attempt,
                current = stored,
                "Discarding event from stale attempt"
            );
            return;
        }

        let event = self.restore_identity(event, &original_task_id);

        if event.kind != EventKind::Task {
            self.dest_queue.push(event);
            return;
        }

        let event = event.with_extension(RETRY_TRIES_KEY, format!("{}/{}", stored, self.retries));

        if event.terminal {
            if (self.retry_pred)(&event) && self.retry(&event).await {
                // The failure was consumed by a fresh attempt.
                return;
            }
            self.task_retries
                .lock()
                .expect("task retries lock poisoned")
                .remove(&original_task_id);
        }

        self.dest_queue.push(event);
    }

    async fn retry_loop(self: Arc<Self>) {
        loop {
            while let Some(event) = self.src_queue.try_pop() {
                self.process_event(event).await;
            }

            if self.stopping.is_cancelled() {
                tracing::debug!("Retry loop observed stop flag, exiting");
                return;
            }

            tokio::select! {
                _ = self.stopping.cancelled() => {
                    tracing::debug!("Retry loop observed stop flag, exiting");
                    return;
                }
                _ = sleep(self.poll_interval) => {}
            }
        }
    }
}

/// Executor wrapper resubmitting failed tasks with fresh attempt tags
pub struct RetryingExecutor {
    inner: Arc<RetryInner>,
    retry_loop: Mutex<Option<JoinHandle<()>>>,
}

impl RetryingExecutor {
    /// Wraps an executor with the default predicate: retry any terminal
    /// event that was not successful
    ///
    /// Must be called from within a tokio runtime; the retry loop is
    /// spawned immediately.
    pub fn new(executor: Arc<dyn TaskExecutor>, policy: RetryPolicy) -> Self {
        RetryingExecutor::with_predicate(executor, policy, Arc::new(|e: &Event| !e.success))
    }

    /// Wraps an executor with a custom retry predicate
    pub fn with_predicate(
        executor: Arc<dyn TaskExecutor>,
        policy: RetryPolicy,
        retry_pred: RetryPredicate,
    ) -> Self {
        let src_queue = executor.event_queue();
        let inner = Arc::new(RetryInner {
            executor,
            retries: policy.retries,
            retry_pred,
            poll_interval: policy.poll_interval,
            task_retries: Mutex::new(HashMap::new()),
            src_queue,
            dest_queue: EventQueue::new(),
            stopping: CancellationToken::new(),
        });

        let retry_loop = tokio::spawn(Arc::clone(&inner).retry_loop());

        RetryingExecutor {
            inner,
            retry_loop: Mutex::new(Some(retry_loop)),
        }
    }

    /// Current attempt number for a task, if tracked
    pub fn current_attempt(&self, task_id: &str) -> Option<i32> {
        self.inner
            .task_retries
            .lock()
            .expect("task retries lock poisoned")
            .get(task_id)
            .copied()
    }
}

#[async_trait]
impl TaskExecutor for RetryingExecutor {
    async fn run(&self, task_config: TaskConfig) {
        self.inner.submit(task_config).await;
    }

    async fn kill(&self, task_id: &str) {
        let attempt = {
            let mut retries = self
                .inner
                .task_retries
                .lock()
                .expect("task retries lock poisoned");
            let previous = retries.get(task_id).copied();
            // Sentinel distinguishing caller kills from exhaustion.
            retries.insert(task_id.to_string(), -1);
            previous
        };

        // Forward the attempt-tagged id so the kill reaches the live
        // attempt on the underlying executor.
        let target = match attempt {
            Some(a) if a >= 1 => task_id::with_retry_suffix(task_id, a),
            _ => task_id.to_string(),
        };
        self.inner.executor.kill(&target).await;
    }

    async fn stop(&self) {
        self.inner.executor.stop().await;
        self.inner.stopping.cancel();

        let retry_loop = self
            .retry_loop
            .lock()
            .expect("retry loop lock poisoned")
            .take();
        if let Some(retry_loop) = retry_loop {
            if let Err(e) = retry_loop.await {
                tracing::warn!(error = %e, "Retry loop exited abnormally");
            }
        }
    }

    fn event_queue(&self) -> EventQueue {
        self.inner.dest_queue.clone()
    }
}
