/// Execution framework
///
/// [`ExecutionFramework`] is the single authority on in-flight task
/// state for one framework instance. It owns:
///
/// - the task queue of configs awaiting a matching offer
/// - the registry mapping task id to [`TaskMetadata`]
/// - the offer-matching and launch pipeline
/// - the status-update demux feeding the task update queue
/// - the offer-suppression control loop
/// - the stuck-task reaper and the agent blacklist
///
/// # Concurrency
///
/// Three long-lived workers touch this state: the transport task
/// invoking the [`Scheduler`] callbacks, the reaper spawned by
/// [`ExecutionFramework::spawn_reaper`], and whoever calls
/// `enqueue_task`. Each shared structure sits behind its own mutex and
/// no code path holds two locks at once, so lock ordering cannot
/// deadlock. Locks are never held across an await; the one exception
/// to lock granularity is the registry lock in `status_update`, held
/// while the event is pushed so that terminal removal and emission are
/// one atomic step.
///
/// # Offer suppression
///
/// ```text
///            enqueue_task()                drained queue + suppress_after elapsed
/// SUPPRESSED ───revive_offers───► OPEN ───suppress_offers───► SUPPRESSED
/// ```
///
/// Initial state is OPEN. The transition to SUPPRESSED is taken inside
/// `resource_offers` when a round launches nothing and the queue is
/// empty.
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use taskproc_shared::metrics::{Dimensions, MetricRegistry};
use taskproc_shared::models::metadata::{task_state, TaskMetadata};
use taskproc_shared::models::task_config::TaskConfig;
use taskproc_shared::now_secs;
use taskproc_shared::queue::EventQueue;

use crate::config::{FrameworkConfig, STUCK_TASK_BLACKLIST_TIMEOUT_S};
use crate::driver::{FrameworkInfo, OfferFilter, Scheduler, SchedulerDriver, StatusUpdate};
use crate::launch::{build_docker_task, TaskInfo};
use crate::offers::{Offer, ResourceSummary};
use crate::translator::StatusTranslator;

// Counter and timer names; part of the framework's interface.
pub const TASK_LAUNCHED_COUNT: &str = "taskproc.framework.task_launched_count";
pub const TASK_FINISHED_COUNT: &str = "taskproc.framework.task_finished_count";
pub const TASK_FAILED_COUNT: &str = "taskproc.framework.task_failed_count";
pub const TASK_KILLED_COUNT: &str = "taskproc.framework.task_killed_count";
pub const TASK_LOST_COUNT: &str = "taskproc.framework.task_lost_count";
pub const TASK_ERROR_COUNT: &str = "taskproc.framework.task_error_count";
pub const TASK_ENQUEUED_COUNT: &str = "taskproc.framework.task_enqueued_count";
pub const TASK_INSUFFICIENT_OFFER_COUNT: &str = "taskproc.framework.task_insufficient_offer_count";
pub const TASK_STUCK_COUNT: &str = "taskproc.framework.task_stuck_count";
pub const BLACKLISTED_AGENTS_COUNT: &str = "taskproc.framework.blacklisted_agents_count";
pub const TASK_QUEUED_TIME_TIMER: &str = "taskproc.framework.task_queued_time_timer";
pub const OFFER_DELAY_TIMER: &str = "taskproc.framework.offer_delay_timer";

const COUNTERS: [&str; 10] = [
    TASK_LAUNCHED_COUNT,
    TASK_FINISHED_COUNT,
    TASK_FAILED_COUNT,
    TASK_KILLED_COUNT,
    TASK_LOST_COUNT,
    TASK_ERROR_COUNT,
    TASK_ENQUEUED_COUNT,
    TASK_INSUFFICIENT_OFFER_COUNT,
    TASK_STUCK_COUNT,
    BLACKLISTED_AGENTS_COUNT,
];

const TIMERS: [&str; 2] = [TASK_QUEUED_TIME_TIMER, OFFER_DELAY_TIMER];

/// Counter incremented for a given terminal state, if any
fn terminal_counter(state: &str) -> Option<&'static str> {
    match state {
        task_state::TASK_FINISHED => Some(TASK_FINISHED_COUNT),
        task_state::TASK_FAILED => Some(TASK_FAILED_COUNT),
        task_state::TASK_KILLED => Some(TASK_KILLED_COUNT),
        task_state::TASK_LOST => Some(TASK_LOST_COUNT),
        task_state::TASK_ERROR => Some(TASK_ERROR_COUNT),
        _ => None,
    }
}

/// Single authority on in-flight task state for one framework instance
pub struct ExecutionFramework {
    config: FrameworkConfig,
    framework_info: FrameworkInfo,
    translator: Arc<dyn StatusTranslator>,
    metrics: Arc<dyn MetricRegistry>,

    driver: Mutex<Option<Arc<dyn SchedulerDriver>>>,
    task_queue: Mutex<VecDeque<TaskConfig>>,
    task_metadata: Mutex<HashMap<String, TaskMetadata>>,
    blacklisted_agents: Mutex<Vec<String>>,
    task_update_queue: EventQueue,

    are_offers_suppressed: AtomicBool,
    stopping: CancellationToken,
    last_offer_time: Mutex<Option<f64>>,
}

impl ExecutionFramework {
    /// Creates a framework and registers its metric series
    pub fn new(
        config: FrameworkConfig,
        translator: Arc<dyn StatusTranslator>,
        metrics: Arc<dyn MetricRegistry>,
    ) -> Self {
        let framework_info = FrameworkInfo {
            user: config.user.clone(),
            name: config.name.clone(),
            role: config.role.clone(),
            principal: config.principal.clone(),
        };

        let dimensions: Dimensions = vec![
            ("framework_name".to_string(), config.name.clone()),
            ("framework_role".to_string(), config.role.clone()),
        ];
        for counter in COUNTERS {
            metrics.register_counter(counter, &dimensions);
        }
        for timer in TIMERS {
            metrics.register_timer(timer, &dimensions);
        }

        ExecutionFramework {
            config,
            framework_info,
            translator,
            metrics,
            driver: Mutex::new(None),
            task_queue: Mutex::new(VecDeque::new()),
            task_metadata: Mutex::new(HashMap::new()),
            blacklisted_agents: Mutex::new(Vec::new()),
            task_update_queue: EventQueue::new(),
            are_offers_suppressed: AtomicBool::new(false),
            stopping: CancellationToken::new(),
            last_offer_time: Mutex::new(None),
        }
    }

    /// The registration struct handed to the driver
    pub fn framework_info(&self) -> &FrameworkInfo {
        &self.framework_info
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    /// The read side of this framework's event stream
    pub fn task_update_queue(&self) -> EventQueue {
        self.task_update_queue.clone()
    }

    /// Tasks awaiting a matching offer
    pub fn pending_count(&self) -> usize {
        self.task_queue.lock().expect("task queue lock poisoned").len()
    }

    /// Tasks registered in-flight (enqueued, launched, or awaiting a
    /// terminal ack)
    pub fn in_flight_count(&self) -> usize {
        self.task_metadata
            .lock()
            .expect("task metadata lock poisoned")
            .len()
    }

    /// Snapshot of one in-flight task's metadata
    pub fn task_metadata(&self, task_id: &str) -> Option<TaskMetadata> {
        self.task_metadata
            .lock()
            .expect("task metadata lock poisoned")
            .get(task_id)
            .cloned()
    }

    /// Snapshot of the blacklist
    pub fn blacklisted_agents(&self) -> Vec<String> {
        self.blacklisted_agents
            .lock()
            .expect("blacklist lock poisoned")
            .clone()
    }

    pub fn offers_suppressed(&self) -> bool {
        self.are_offers_suppressed.load(Ordering::SeqCst)
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.is_cancelled()
    }

    /// The driver handle remembered from `registered`, if any
    pub fn registered_driver(&self) -> Option<Arc<dyn SchedulerDriver>> {
        self.driver.lock().expect("driver lock poisoned").clone()
    }

    /// Registers a task and queues it for the next matching offer
    ///
    /// The task enters the registry in `TASK_INITED`; a duplicate task
    /// id overwrites its metadata and bumps its resubmission counter,
    /// so callers must submit fresh uuids. If offers are currently
    /// suppressed their revival is requested.
    pub async fn enqueue_task(&self, task_config: TaskConfig) {
        let task_id = task_config.task_id();
        let now = now_secs();

        {
            let mut metadata = self
                .task_metadata
                .lock()
                .expect("task metadata lock poisoned");
            let retries = metadata
                .get(&task_id)
                .map(|existing| existing.retries + 1)
                .unwrap_or(0);
            if retries > 0 {
                tracing::warn!(
                    task_id = %task_id,
                    retries,
                    "Duplicate task id enqueued, overwriting in-flight metadata"
                );
            }
            metadata.insert(
                task_id.clone(),
                TaskMetadata::new(task_config.clone(), task_state::TASK_INITED, now)
                    .with_retries(retries),
            );
        }
        {
            let mut queue = self.task_queue.lock().expect("task queue lock poisoned");
            queue.push_back(task_config);
        }

        tracing::info!(task_id = %task_id, "Enqueued task");
        self.metrics.count(TASK_ENQUEUED_COUNT, 1);

        if self.offers_suppressed() {
            if let Some(driver) = self.registered_driver() {
                driver.revive_offers().await;
                self.are_offers_suppressed.store(false, Ordering::SeqCst);
                tracing::info!("Revived offers for new work");
            }
        }
    }

    /// Forwards a kill to the driver
    ///
    /// The registry entry is not removed here; removal happens when the
    /// terminal status update arrives.
    pub async fn kill_task(&self, task_id: &str) {
        match self.registered_driver() {
            Some(driver) => {
                tracing::info!(task_id = %task_id, "Killing task");
                driver.kill_task(task_id).await;
            }
            None => {
                tracing::warn!(task_id = %task_id, "Cannot kill task, driver not registered");
            }
        }
    }

    /// Flags the framework as stopping
    ///
    /// The reaper exits at its next wake-up and subsequent offers are
    /// declined. In-flight offers are not forcibly aborted.
    pub fn stop(&self) {
        tracing::info!(framework = %self.config.name, "Stopping execution framework");
        self.stopping.cancel();
    }

    /// Whether an offer passes the pool placement filter
    ///
    /// An offer matches when no pool is configured or the offer carries
    /// a `pool` attribute equal to the configured pool.
    pub fn offer_matches_pool(&self, offer: &Offer) -> bool {
        match &self.config.pool {
            None => true,
            Some(pool) => offer.attribute("pool") == Some(pool.as_str()),
        }
    }

    /// Drains the task queue against one offer, FIFO order
    ///
    /// Tasks the offer satisfies are packed into launch messages; their
    /// metadata gets the offer's agent recorded and their queued time
    /// observed. Tasks that do not fit stay queued in order and count
    /// one insufficient-offer observation each.
    pub fn get_tasks_to_launch(&self, offer: &Offer) -> Vec<TaskInfo> {
        let now = now_secs();
        let mut summary = ResourceSummary::from_offer(offer);
        let mut launchable: Vec<(TaskConfig, Vec<u32>)> = Vec::new();

        {
            let mut queue = self.task_queue.lock().expect("task queue lock poisoned");
            let mut remaining = VecDeque::with_capacity(queue.len());

            while let Some(task) = queue.pop_front() {
                match summary.allocate(&task) {
                    Some(ports) => launchable.push((task, ports)),
                    None => {
                        tracing::debug!(
                            task_id = %task.task_id(),
                            offer_id = %offer.id,
                            "Offer does not satisfy task requirements"
                        );
                        self.metrics.count(TASK_INSUFFICIENT_OFFER_COUNT, 1);
                        remaining.push_back(task);
                    }
                }
            }
            *queue = remaining;
        }

        if launchable.is_empty() {
            return Vec::new();
        }

        {
            let mut metadata = self
                .task_metadata
                .lock()
                .expect("task metadata lock poisoned");
            for (task, _) in &launchable {
                let task_id = task.task_id();
                let Some(meta) = metadata.get(&task_id).cloned() else {
                    continue;
                };
                self.metrics
                    .record(TASK_QUEUED_TIME_TIMER, now - meta.task_state_ts);
                metadata.insert(task_id, meta.with_agent_id(&offer.agent_id));
            }
        }

        launchable
            .iter()
            .map(|(task, ports)| build_docker_task(offer, task, ports, &self.config.role))
            .collect()
    }

    async fn handle_offers(&self, offers: Vec<Offer>) {
        let Some(driver) = self.registered_driver() else {
            tracing::warn!("Received offers before registration, ignoring");
            return;
        };
        let filter = OfferFilter {
            refuse_seconds: self.config.offer_refuse_seconds,
        };

        let mut any_launched = false;
        for offer in offers {
            if self.is_stopping() {
                driver.decline_offer(&offer.id, &filter).await;
                continue;
            }

            let blacklisted = self
                .blacklisted_agents
                .lock()
                .expect("blacklist lock poisoned")
                .contains(&offer.agent_id);
            if blacklisted {
                tracing::info!(
                    agent_id = %offer.agent_id,
                    offer_id = %offer.id,
                    "Declining offer from blacklisted agent"
                );
                driver.decline_offer(&offer.id, &filter).await;
                continue;
            }

            if !self.offer_matches_pool(&offer) {
                tracing::debug!(
                    offer_id = %offer.id,
                    pool = ?self.config.pool,
                    "Declining offer outside configured pool"
                );
                driver.decline_offer(&offer.id, &filter).await;
                continue;
            }

            let tasks = self.get_tasks_to_launch(&offer);
            if tasks.is_empty() {
                driver.decline_offer(&offer.id, &filter).await;
                continue;
            }

            let now = now_secs();
            let previous = {
                let mut last = self
                    .last_offer_time
                    .lock()
                    .expect("offer time lock poisoned");
                let previous = *last;
                *last = Some(now);
                previous
            };
            if let Some(previous) = previous {
                self.metrics.record(OFFER_DELAY_TIMER, now - previous);
            }

            tracing::info!(
                offer_id = %offer.id,
                agent_id = %offer.agent_id,
                count = tasks.len(),
                "Launching tasks"
            );
            driver.launch_tasks(&offer.id, &tasks).await;
            self.metrics.count(TASK_LAUNCHED_COUNT, tasks.len() as u64);
            any_launched = true;
        }

        if !any_launched && !self.offers_suppressed() && self.pending_count() == 0 {
            let elapsed = self
                .last_offer_time
                .lock()
                .expect("offer time lock poisoned")
                .map(|t| now_secs() - t)
                .unwrap_or(f64::INFINITY);
            if elapsed >= self.config.suppress_after_s {
                driver.suppress_offers().await;
                self.are_offers_suppressed.store(true, Ordering::SeqCst);
                tracing::info!("No work left, suppressed offers");
            }
        }
    }

    async fn handle_status_update(&self, update: StatusUpdate) {
        let now = now_secs();

        let emitted = {
            let mut metadata = self
                .task_metadata
                .lock()
                .expect("task metadata lock poisoned");

            match metadata.get(&update.task_id).cloned() {
                None => {
                    // Duplicate or post-terminal update; still needs an ack.
                    tracing::debug!(
                        task_id = %update.task_id,
                        state = %update.state,
                        "Status update for unknown task"
                    );
                    None
                }
                Some(meta) => {
                    let event = self
                        .translator
                        .translate(&update)
                        .with_task_id(&update.task_id)
                        .with_task_config(meta.task_config.clone());

                    if event.terminal {
                        metadata.remove(&update.task_id);
                    } else {
                        let updated = meta.with_state(&update.state, now);
                        metadata.insert(update.task_id.clone(), updated);
                    }

                    // Pushed under the registry lock: terminal removal is
                    // atomic with emission.
                    self.task_update_queue.push(event.clone());
                    Some(event)
                }
            }
        };

        if let Some(event) = &emitted {
            tracing::info!(
                task_id = %update.task_id,
                state = %update.state,
                terminal = event.terminal,
                "Task status update"
            );
            if event.terminal {
                if let Some(counter) = terminal_counter(&update.state) {
                    self.metrics.count(counter, 1);
                }
            }
        }

        match self.registered_driver() {
            Some(driver) => driver.acknowledge_status_update(&update).await,
            None => tracing::warn!(
                task_id = %update.task_id,
                "Cannot acknowledge status update, driver not registered"
            ),
        }
    }

    /// Adds an agent to the blacklist and schedules its expiry
    pub fn blacklist_agent(self: &Arc<Self>, agent_id: &str, timeout: Duration) {
        {
            let mut blacklist = self
                .blacklisted_agents
                .lock()
                .expect("blacklist lock poisoned");
            if blacklist.iter().any(|a| a == agent_id) {
                tracing::warn!(agent_id = %agent_id, "Agent already blacklisted");
            } else {
                tracing::info!(
                    agent_id = %agent_id,
                    timeout_s = timeout.as_secs_f64(),
                    "Blacklisting agent"
                );
                blacklist.push(agent_id.to_string());
            }
        }
        self.metrics.count(BLACKLISTED_AGENTS_COUNT, 1);

        let framework = Arc::clone(self);
        let agent_id = agent_id.to_string();
        tokio::spawn(async move {
            framework.unblacklist_agent(&agent_id, timeout).await;
        });
    }

    /// Removes an agent from the blacklist after a delay
    pub async fn unblacklist_agent(&self, agent_id: &str, after: Duration) {
        sleep(after).await;
        self.blacklisted_agents
            .lock()
            .expect("blacklist lock poisoned")
            .retain(|a| a != agent_id);
        tracing::info!(agent_id = %agent_id, "Removed agent from blacklist");
    }

    /// One reaper pass: kill tasks stuck in staging
    ///
    /// Every task sitting in `TASK_STAGING` longer than the staging
    /// timeout is killed and its agent blacklisted for 900 seconds. The
    /// terminal event surfaces later, once the kill status arrives.
    pub async fn kill_tasks_stuck_in_staging(self: &Arc<Self>) {
        let now = now_secs();
        let timeout = self.config.task_staging_timeout_s;

        let stuck: Vec<(String, Option<String>)> = {
            let metadata = self
                .task_metadata
                .lock()
                .expect("task metadata lock poisoned");
            metadata
                .iter()
                .filter(|(_, meta)| {
                    meta.task_state == task_state::TASK_STAGING
                        && now - meta.task_state_ts > timeout
                })
                .map(|(task_id, meta)| (task_id.clone(), meta.agent_id.clone()))
                .collect()
        };

        for (task_id, agent_id) in stuck {
            tracing::warn!(
                task_id = %task_id,
                agent_id = ?agent_id,
                timeout_s = timeout,
                "Task stuck in staging, killing"
            );
            self.metrics.count(TASK_STUCK_COUNT, 1);
            self.kill_task(&task_id).await;
            if let Some(agent_id) = agent_id {
                self.blacklist_agent(
                    &agent_id,
                    Duration::from_secs_f64(STUCK_TASK_BLACKLIST_TIMEOUT_S),
                );
            }
        }
    }

    /// Spawns the reaper loop; exits once the framework is stopping
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let framework = Arc::clone(self);
        tokio::spawn(async move {
            let interval = Duration::from_secs_f64(framework.config.reaper_interval_s.max(0.01));
            loop {
                tokio::select! {
                    _ = framework.stopping.cancelled() => {
                        tracing::debug!("Reaper observed stop flag, exiting");
                        break;
                    }
                    _ = sleep(interval) => {
                        framework.kill_tasks_stuck_in_staging().await;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl Scheduler for ExecutionFramework {
    async fn registered(
        &self,
        driver: Arc<dyn SchedulerDriver>,
        framework_id: &str,
        _master_info: &JsonValue,
    ) {
        tracing::info!(framework_id = %framework_id, "Framework registered");
        *self.driver.lock().expect("driver lock poisoned") = Some(driver);
    }

    async fn reregistered(&self, _master_info: &JsonValue) {
        tracing::info!("Framework re-registered");
    }

    async fn disconnected(&self) {
        tracing::warn!("Framework disconnected from master");
    }

    async fn resource_offers(&self, offers: Vec<Offer>) {
        self.handle_offers(offers).await;
    }

    async fn offer_rescinded(&self, offer_id: &str) {
        tracing::debug!(offer_id = %offer_id, "Offer rescinded");
    }

    async fn status_update(&self, update: StatusUpdate) {
        self.handle_status_update(update).await;
    }

    async fn framework_message(&self, executor_id: &str, agent_id: &str, _message: &[u8]) {
        tracing::debug!(
            executor_id = %executor_id,
            agent_id = %agent_id,
            "Framework message received"
        );
    }

    async fn slave_lost(&self, agent_id: &str) {
        tracing::warn!(agent_id = %agent_id, "Agent lost");
    }

    async fn executor_lost(&self, executor_id: &str, agent_id: &str, status: i32) {
        tracing::warn!(
            executor_id = %executor_id,
            agent_id = %agent_id,
            status = status,
            "Executor lost"
        );
    }

    async fn error(&self, message: &str) {
        tracing::error!(message = %message, "Framework error from master");
    }
}
