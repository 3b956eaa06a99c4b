/// Cluster-backed task executor
///
/// [`ClusterExecutor`] is the top-level [`TaskExecutor`] over one
/// [`ExecutionFramework`]. It encapsulates the state required to run,
/// monitor and stop container tasks: the framework, the credential
/// presented at registration, and the background reaper.
///
/// The transport wiring is the embedder's job: build a driver around
/// [`ClusterExecutor::framework`] (it implements the
/// [`Scheduler`](crate::driver::Scheduler) callbacks) and invoke
/// `registered` once connected. From that point offers and status
/// updates flow in on the transport's task and events flow out on the
/// queue returned by `event_queue`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskproc_framework::config::FrameworkConfig;
/// use taskproc_framework::executor::ClusterExecutor;
/// use taskproc_framework::translator::DefaultTranslator;
/// use taskproc_shared::executor::TaskExecutor;
/// use taskproc_shared::metrics::InMemoryMetrics;
/// use taskproc_shared::models::TaskConfig;
///
/// # async fn example() {
/// let executor = ClusterExecutor::new(
///     FrameworkConfig::new("batch", "batch-role"),
///     Arc::new(DefaultTranslator),
///     Arc::new(InMemoryMetrics::new()),
/// );
///
/// let task = TaskConfig::builder().name("batch-job").build().unwrap();
/// executor.run(task).await;
/// # }
/// ```
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use taskproc_shared::executor::TaskExecutor;
use taskproc_shared::metrics::MetricRegistry;
use taskproc_shared::models::task_config::TaskConfig;
use taskproc_shared::queue::EventQueue;

use crate::config::FrameworkConfig;
use crate::driver::Credential;
use crate::framework::ExecutionFramework;
use crate::translator::StatusTranslator;

/// Top-level executor over one execution framework
pub struct ClusterExecutor {
    framework: Arc<ExecutionFramework>,
    credential: Credential,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl ClusterExecutor {
    /// Builds the framework, loads the credential, and starts the
    /// stuck-task reaper
    pub fn new(
        config: FrameworkConfig,
        translator: Arc<dyn StatusTranslator>,
        metrics: Arc<dyn MetricRegistry>,
    ) -> Self {
        let credential = Credential::load(
            config.principal.clone(),
            config.credential_secret_file.as_deref(),
        );

        let framework = Arc::new(ExecutionFramework::new(config, translator, metrics));
        let reaper = framework.spawn_reaper();

        ClusterExecutor {
            framework,
            credential,
            reaper: Mutex::new(Some(reaper)),
        }
    }

    /// The framework backing this executor; wire the transport's
    /// callbacks to it
    pub fn framework(&self) -> &Arc<ExecutionFramework> {
        &self.framework
    }

    /// The credential presented at registration
    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

#[async_trait]
impl TaskExecutor for ClusterExecutor {
    async fn run(&self, task_config: TaskConfig) {
        self.framework.enqueue_task(task_config).await;
    }

    async fn kill(&self, task_id: &str) {
        self.framework.kill_task(task_id).await;
    }

    async fn stop(&self) {
        self.framework.stop();
        if let Some(driver) = self.framework.registered_driver() {
            driver.stop().await;
        }

        let reaper = self.reaper.lock().expect("reaper lock poisoned").take();
        if let Some(reaper) = reaper {
            if let Err(e) = reaper.await {
                tracing::warn!(error = %e, "Reaper exited abnormally");
            }
        }
    }

    fn event_queue(&self) -> EventQueue {
        self.framework.task_update_queue()
    }
}
