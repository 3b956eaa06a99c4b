//! Shared fixtures for the integration suites: a recording fake driver,
//! a recording fake executor, and the canonical offer/task shapes.

// Each suite compiles this module separately and uses its own subset.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use taskproc_framework::driver::{OfferFilter, SchedulerDriver, StatusUpdate};
use taskproc_framework::launch::TaskInfo;
use taskproc_framework::offers::{Attribute, Offer, PortRange, Resource};
use taskproc_shared::executor::TaskExecutor;
use taskproc_shared::models::task_config::TaskConfig;
use taskproc_shared::queue::EventQueue;

/// Driver double recording every outbound call
#[derive(Default)]
pub struct FakeDriver {
    pub launches: Mutex<Vec<(String, Vec<TaskInfo>)>>,
    pub declines: Mutex<Vec<String>>,
    pub kills: Mutex<Vec<String>>,
    pub acks: Mutex<Vec<StatusUpdate>>,
    pub suppress_calls: AtomicUsize,
    pub revive_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
}

impl FakeDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeDriver::default())
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn decline_count(&self) -> usize {
        self.declines.lock().unwrap().len()
    }

    pub fn ack_count(&self) -> usize {
        self.acks.lock().unwrap().len()
    }

    pub fn killed_tasks(&self) -> Vec<String> {
        self.kills.lock().unwrap().clone()
    }

    pub fn launched_tasks(&self) -> Vec<TaskInfo> {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, tasks)| tasks.clone())
            .collect()
    }
}

#[async_trait]
impl SchedulerDriver for FakeDriver {
    async fn launch_tasks(&self, offer_id: &str, tasks: &[TaskInfo]) {
        self.launches
            .lock()
            .unwrap()
            .push((offer_id.to_string(), tasks.to_vec()));
    }

    async fn decline_offer(&self, offer_id: &str, _filter: &OfferFilter) {
        self.declines.lock().unwrap().push(offer_id.to_string());
    }

    async fn suppress_offers(&self) {
        self.suppress_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn revive_offers(&self) {
        self.revive_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn kill_task(&self, task_id: &str) {
        self.kills.lock().unwrap().push(task_id.to_string());
    }

    async fn acknowledge_status_update(&self, update: &StatusUpdate) {
        self.acks.lock().unwrap().push(update.clone());
    }

    async fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Executor double recording submissions; tests feed its event queue by
/// hand to play the upstream role
#[derive(Default)]
pub struct FakeExecutor {
    pub runs: Mutex<Vec<TaskConfig>>,
    pub kills: Mutex<Vec<String>>,
    pub stopped: AtomicBool,
    queue: EventQueue,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeExecutor::default())
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    pub fn submitted(&self, index: usize) -> TaskConfig {
        self.runs.lock().unwrap()[index].clone()
    }

    pub fn killed_tasks(&self) -> Vec<String> {
        self.kills.lock().unwrap().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskExecutor for FakeExecutor {
    async fn run(&self, task_config: TaskConfig) {
        self.runs.lock().unwrap().push(task_config);
    }

    async fn kill(&self, task_id: &str) {
        self.kills.lock().unwrap().push(task_id.to_string());
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn event_queue(&self) -> EventQueue {
        self.queue.clone()
    }
}

/// The canonical offer the suites match against
pub fn fake_offer() -> Offer {
    Offer {
        id: "fake_offer_id".to_string(),
        agent_id: "fake_agent_id".to_string(),
        hostname: "fake_hostname".to_string(),
        resources: vec![
            Resource::scalar("cpus", "fake_role", 10.0),
            Resource::scalar("mem", "fake_role", 1024.0),
            Resource::scalar("disk", "fake_role", 1000.0),
            Resource::ranges(
                "ports",
                "fake_role",
                vec![PortRange {
                    begin: 31200,
                    end: 31500,
                }],
            ),
        ],
        attributes: vec![Attribute {
            name: "pool".to_string(),
            text: "fake_pool_text".to_string(),
        }],
    }
}

/// A task the canonical offer exactly satisfies
pub fn fake_task() -> TaskConfig {
    TaskConfig::builder()
        .name("fake_name")
        .cpus(10.0)
        .mem(1024.0)
        .disk(1000.0)
        .image("fake_image")
        .cmd("echo \"fake\"")
        .build()
        .unwrap()
}

/// Installs a test subscriber so `RUST_LOG` works under `cargo test`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskproc_framework=warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Polls until `cond` holds, panicking after one second
pub async fn wait_for(description: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {description}");
}
