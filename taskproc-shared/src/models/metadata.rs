/// In-flight task bookkeeping
///
/// [`TaskMetadata`] tracks one in-flight task inside the framework's
/// registry: the config it was submitted with, the agent it landed on,
/// and the last cluster-reported state with its timestamp. Entries live
/// from enqueue until the terminal status update and are updated by
/// replacement, never in place.
use serde::{Deserialize, Serialize};

use crate::models::task_config::TaskConfig;

/// Cluster task state strings
///
/// The framework stores states verbatim as reported by the cluster; the
/// constants below are the ones it reasons about.
pub mod task_state {
    /// Registered locally, not yet launched
    pub const TASK_INITED: &str = "TASK_INITED";

    /// Launched, waiting for the agent to start it
    pub const TASK_STAGING: &str = "TASK_STAGING";

    pub const TASK_STARTING: &str = "TASK_STARTING";
    pub const TASK_RUNNING: &str = "TASK_RUNNING";

    // Terminal states
    pub const TASK_FINISHED: &str = "TASK_FINISHED";
    pub const TASK_FAILED: &str = "TASK_FAILED";
    pub const TASK_KILLED: &str = "TASK_KILLED";
    pub const TASK_LOST: &str = "TASK_LOST";
    pub const TASK_ERROR: &str = "TASK_ERROR";
}

/// Mutable-by-replacement record for one in-flight task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// The config the task was submitted with
    pub task_config: TaskConfig,

    /// Agent the task was launched on; None until launch
    pub agent_id: Option<String>,

    /// Last cluster-reported state string
    pub task_state: String,

    /// Wall-clock seconds of the last state transition; non-decreasing
    /// within one task's lifetime
    pub task_state_ts: f64,

    /// Framework-local resubmission counter; counts enqueues that
    /// overwrote an existing registry entry for the same task id
    pub retries: u32,
}

impl TaskMetadata {
    /// Creates metadata for a freshly enqueued task
    pub fn new(task_config: TaskConfig, task_state: impl Into<String>, task_state_ts: f64) -> Self {
        TaskMetadata {
            task_config,
            agent_id: None,
            task_state: task_state.into(),
            task_state_ts,
            retries: 0,
        }
    }

    /// Copy with a replaced state; the timestamp is clamped so it never
    /// moves backwards
    pub fn with_state(&self, task_state: impl Into<String>, task_state_ts: f64) -> Self {
        TaskMetadata {
            task_state: task_state.into(),
            task_state_ts: task_state_ts.max(self.task_state_ts),
            ..self.clone()
        }
    }

    /// Copy with the launch agent recorded
    pub fn with_agent_id(&self, agent_id: impl Into<String>) -> Self {
        TaskMetadata {
            agent_id: Some(agent_id.into()),
            ..self.clone()
        }
    }

    /// Copy with the resubmission counter replaced
    pub fn with_retries(&self, retries: u32) -> Self {
        TaskMetadata {
            retries,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_task() -> TaskConfig {
        TaskConfig::builder().name("fake_name").build().unwrap()
    }

    #[test]
    fn test_new_metadata() {
        let meta = TaskMetadata::new(fake_task(), task_state::TASK_INITED, 1.0);
        assert_eq!(meta.task_state, "TASK_INITED");
        assert_eq!(meta.task_state_ts, 1.0);
        assert_eq!(meta.agent_id, None);
        assert_eq!(meta.retries, 0);
    }

    #[test]
    fn test_with_state_replaces() {
        let meta = TaskMetadata::new(fake_task(), task_state::TASK_INITED, 1.0);
        let updated = meta.with_state(task_state::TASK_STAGING, 2.0);

        assert_eq!(updated.task_state, "TASK_STAGING");
        assert_eq!(updated.task_state_ts, 2.0);
        // original untouched
        assert_eq!(meta.task_state, "TASK_INITED");
    }

    #[test]
    fn test_state_timestamp_never_regresses() {
        let meta = TaskMetadata::new(fake_task(), task_state::TASK_STAGING, 5.0);
        let updated = meta.with_state(task_state::TASK_RUNNING, 3.0);
        assert_eq!(updated.task_state_ts, 5.0);
    }

    #[test]
    fn test_with_agent_id() {
        let meta = TaskMetadata::new(fake_task(), task_state::TASK_INITED, 1.0);
        let updated = meta.with_agent_id("fake_agent_id");
        assert_eq!(updated.agent_id.as_deref(), Some("fake_agent_id"));
    }

    #[test]
    fn test_with_retries() {
        let meta = TaskMetadata::new(fake_task(), task_state::TASK_INITED, 1.0);
        let updated = meta.with_retries(2);
        assert_eq!(updated.retries, 2);
        assert_eq!(meta.retries, 0);
    }
}
