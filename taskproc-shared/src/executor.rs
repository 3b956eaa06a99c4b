/// Task executor contract
///
/// Every executor, whether cluster-backed or wrapping another
/// executor, exposes exactly this surface: submit a task, kill a task,
/// stop the executor, and hand out the event queue. Wrapping executors
/// compose by holding an inner `Arc<dyn TaskExecutor>` and exposing a
/// queue of their own.
///
/// # Error absorption
///
/// Nothing here returns an error. Transient conditions are absorbed
/// into metrics and the event stream; the only construction-time
/// failure callers see is task config validation.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskproc_shared::executor::TaskExecutor;
/// use taskproc_shared::models::TaskConfig;
///
/// # async fn example(executor: Arc<dyn TaskExecutor>) {
/// let task = TaskConfig::builder().name("batch-job").build().unwrap();
/// let task_id = task.task_id();
///
/// executor.run(task).await;
///
/// let queue = executor.event_queue();
/// loop {
///     let event = queue.pop().await;
///     if event.task_id == task_id && event.terminal {
///         break;
///     }
/// }
/// # }
/// ```
use async_trait::async_trait;

use crate::models::task_config::TaskConfig;
use crate::queue::EventQueue;

/// Uniform caller-facing executor contract
///
/// The accepted task variant is [`TaskConfig`]; it appears verbatim in
/// `run` and rides along on every task event.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Submits a task for execution
    async fn run(&self, task_config: TaskConfig);

    /// Requests termination of an in-flight task
    ///
    /// Completion is reported asynchronously: the terminal event arrives
    /// on the event queue once the cluster confirms the kill.
    async fn kill(&self, task_id: &str);

    /// Stops the executor and its background workers
    async fn stop(&self);

    /// The read side of this executor's event stream
    fn event_queue(&self) -> EventQueue;
}
