/// Top-level executor and runner integration suite
///
/// Exercises the cluster executor against a recording fake driver, the
/// sync runner against a fake executor, and the full composition of
/// retrying executor over cluster executor.
mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;

use common::{fake_offer, fake_task, wait_for, FakeDriver, FakeExecutor};
use taskproc_framework::config::FrameworkConfig;
use taskproc_framework::driver::{Scheduler, SchedulerDriver, StatusUpdate};
use taskproc_framework::executor::ClusterExecutor;
use taskproc_framework::retry::{RetryPolicy, RetryingExecutor, RETRY_TRIES_KEY};
use taskproc_framework::runner::SyncRunner;
use taskproc_framework::translator::DefaultTranslator;
use taskproc_shared::executor::TaskExecutor;
use taskproc_shared::metrics::InMemoryMetrics;
use taskproc_shared::models::event::Event;
use taskproc_shared::models::task_state;

fn make_executor() -> ClusterExecutor {
    common::init_tracing();
    let mut config = FrameworkConfig::new("fake_name", "fake_role");
    config.suppress_after_s = 0.0;
    ClusterExecutor::new(
        config,
        Arc::new(DefaultTranslator),
        Arc::new(InMemoryMetrics::new()),
    )
}

async fn register(executor: &ClusterExecutor, driver: &Arc<FakeDriver>) {
    let handle: Arc<dyn SchedulerDriver> = driver.clone();
    executor
        .framework()
        .registered(handle, "fake_framework_id", &JsonValue::Null)
        .await;
}

#[tokio::test]
async fn test_run_enqueues_into_framework() {
    let executor = make_executor();

    let task = fake_task();
    let task_id = task.task_id();
    executor.run(task).await;

    assert_eq!(executor.framework().pending_count(), 1);
    let meta = executor
        .framework()
        .task_metadata(&task_id)
        .expect("metadata present");
    assert_eq!(meta.task_state, task_state::TASK_INITED);
}

#[tokio::test]
async fn test_kill_forwards_to_framework_driver() {
    let executor = make_executor();
    let driver = FakeDriver::new();
    register(&executor, &driver).await;

    executor.kill("fake_task_id").await;

    assert_eq!(driver.killed_tasks(), vec!["fake_task_id".to_string()]);
}

#[tokio::test]
async fn test_stop_stops_framework_and_driver() {
    let executor = make_executor();
    let driver = FakeDriver::new();
    register(&executor, &driver).await;

    tokio::time::timeout(Duration::from_secs(2), executor.stop())
        .await
        .expect("stop should join the reaper promptly");

    assert!(executor.framework().is_stopping());
    assert_eq!(driver.stop_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_credential_defaults_without_secret_file() {
    let executor = make_executor();
    assert_eq!(executor.credential().principal, "taskproc");
    assert_eq!(executor.credential().secret, None);
}

#[tokio::test]
async fn test_lifecycle_through_driver_callbacks() {
    let executor = make_executor();
    let driver = FakeDriver::new();
    register(&executor, &driver).await;

    let task = fake_task();
    let task_id = task.task_id();
    executor.run(task).await;

    executor.framework().resource_offers(vec![fake_offer()]).await;
    assert_eq!(driver.launch_count(), 1);

    executor
        .framework()
        .status_update(StatusUpdate::new(&task_id, task_state::TASK_FINISHED))
        .await;

    let event = executor.event_queue().try_pop().expect("terminal event");
    assert!(event.terminal);
    assert!(event.success);
    assert_eq!(event.task_id, task_id);
}

#[tokio::test]
async fn test_sync_runner_returns_terminal_event() {
    let upstream = FakeExecutor::new();
    let runner = SyncRunner::new(upstream.clone());

    let task = fake_task();
    let task_id = task.task_id();

    let queue = upstream.event_queue();
    let feeder_id = task_id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(Event::task(&feeder_id, task_state::TASK_RUNNING));
        queue.push(Event::task(&feeder_id, task_state::TASK_FINISHED).with_outcome(true, true));
    });

    let event = tokio::time::timeout(Duration::from_secs(1), runner.run(task))
        .await
        .expect("runner should observe the terminal event");

    assert!(event.terminal);
    assert!(event.success);
    assert_eq!(event.task_id, task_id);
    assert_eq!(upstream.run_count(), 1);
}

#[tokio::test]
async fn test_sync_runner_republishes_foreign_events() {
    let upstream = FakeExecutor::new();
    let runner = SyncRunner::new(upstream.clone());

    let task = fake_task();
    let task_id = task.task_id();

    let foreign = Event::task("other_task.u9", task_state::TASK_RUNNING);
    upstream.event_queue().push(foreign.clone());
    upstream
        .event_queue()
        .push(Event::task(&task_id, task_state::TASK_FINISHED).with_outcome(true, true));

    let event = tokio::time::timeout(Duration::from_secs(2), runner.run(task))
        .await
        .expect("runner should skip past the foreign event");
    assert_eq!(event.task_id, task_id);

    // The foreign event went back onto the queue for its consumer.
    assert_eq!(upstream.event_queue().try_pop(), Some(foreign));
}

#[tokio::test]
async fn test_retrying_over_cluster_executor_round_trip() {
    let executor = make_executor();
    let driver = FakeDriver::new();
    register(&executor, &driver).await;
    let framework = executor.framework().clone();

    let retrying = RetryingExecutor::new(
        Arc::new(executor),
        RetryPolicy {
            retries: 3,
            poll_interval: Duration::from_millis(10),
        },
    );

    let task = fake_task();
    let task_id = task.task_id();
    retrying.run(task).await;

    // Attempt 1 is queued under its tagged identity and launched.
    assert_eq!(framework.pending_count(), 1);
    framework.resource_offers(vec![fake_offer()]).await;
    let first_launched = driver.launched_tasks()[0].task_id.clone();
    assert_eq!(first_launched, format!("{task_id}-retry1"));

    // Attempt 1 fails; the retry loop resubmits attempt 2.
    framework
        .status_update(StatusUpdate::new(&first_launched, task_state::TASK_FAILED))
        .await;
    wait_for("second attempt enqueue", || framework.pending_count() == 1).await;

    framework.resource_offers(vec![fake_offer()]).await;
    let second_launched = driver.launched_tasks()[1].task_id.clone();
    assert_eq!(second_launched, format!("{task_id}-retry2"));

    // Attempt 2 finishes; the consumer sees the original identity.
    framework
        .status_update(StatusUpdate::new(&second_launched, task_state::TASK_FINISHED))
        .await;

    let event = tokio::time::timeout(Duration::from_secs(1), retrying.event_queue().pop())
        .await
        .expect("republished terminal event");
    assert!(event.terminal);
    assert!(event.success);
    assert_eq!(event.task_id, task_id);
    assert_eq!(
        event.extensions.get(RETRY_TRIES_KEY),
        Some(&"2/3".to_string())
    );
}
