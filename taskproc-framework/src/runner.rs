/// Synchronous convenience runner
///
/// [`SyncRunner`] submits one task and blocks until its terminal event
/// arrives. Events belonging to other tasks are re-published onto the
/// queue (with a short nap so another consumer gets a chance to pick
/// them up), which lets several runners share one executor.
use std::sync::Arc;

use tokio::time::{sleep, Duration};

use taskproc_shared::executor::TaskExecutor;
use taskproc_shared::models::event::Event;
use taskproc_shared::models::task_config::TaskConfig;

/// Blocks on a single task id over any executor
pub struct SyncRunner {
    executor: Arc<dyn TaskExecutor>,
}

impl SyncRunner {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        SyncRunner { executor }
    }

    /// Submits a task and waits for its terminal event
    pub async fn run(&self, task_config: TaskConfig) -> Event {
        let task_id = task_config.task_id();
        self.executor.run(task_config).await;

        let queue = self.executor.event_queue();
        loop {
            let event = queue.pop().await;

            if event.task_id != task_id {
                // Somebody else's event; put it back for its consumer.
                queue.push(event);
                sleep(Duration::from_millis(100)).await;
                continue;
            }

            if event.terminal {
                return event;
            }
            tracing::debug!(
                task_id = %event.task_id,
                platform_type = %event.platform_type,
                "Non-terminal event"
            );
        }
    }

    /// Forwards a kill to the underlying executor
    pub async fn kill(&self, task_id: &str) {
        self.executor.kill(task_id).await;
    }

    /// Stops the underlying executor
    pub async fn stop(&self) {
        self.executor.stop().await;
    }
}
