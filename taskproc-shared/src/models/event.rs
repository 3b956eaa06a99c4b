/// Task lifecycle event model
///
/// An [`Event`] is the immutable record of one task lifecycle transition
/// as observed by an executor. Events flow from the execution framework
/// through any wrapping executors to the consumer draining the event
/// queue.
///
/// # Immutability
///
/// An Event is constructed once and never mutated. "Transform" means
/// "produce a copy with one field replaced", via the `with_*`
/// constructors below. Wrapping executors rely on this to rewrite
/// identities without disturbing events already handed downstream.
///
/// # Extensions
///
/// `extensions` is an open string map from key path to value. Layers
/// stacked on top of the framework annotate events here without the
/// model having to know about them (the retrying executor records its
/// attempt counter under `RetryingExecutor/tries`).
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::task_config::TaskConfig;

/// Event classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A task lifecycle transition
    Task,

    /// An executor-level control notification
    Control,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Task => "task",
            EventKind::Control => "control",
        }
    }
}

/// Immutable record of one task lifecycle transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Composite task identity this event belongs to
    pub task_id: String,

    /// Wall-clock seconds when the event was produced
    pub timestamp: f64,

    /// True when the task has no further lifecycle transitions
    pub terminal: bool,

    /// Whether a terminal task ended successfully; false otherwise
    pub success: bool,

    /// Event classification
    pub kind: EventKind,

    /// Platform-specific event name (the cluster state string)
    pub platform_type: String,

    /// The config the task was submitted with, when known
    pub task_config: Option<TaskConfig>,

    /// Opaque platform payload the event was translated from
    pub raw: JsonValue,

    /// Open annotation bag: key path -> value
    pub extensions: BTreeMap<String, String>,
}

impl Event {
    /// Constructs a task event with empty payload and annotations
    pub fn task(task_id: impl Into<String>, platform_type: impl Into<String>) -> Self {
        Event {
            task_id: task_id.into(),
            timestamp: crate::now_secs(),
            terminal: false,
            success: false,
            kind: EventKind::Task,
            platform_type: platform_type.into(),
            task_config: None,
            raw: JsonValue::Null,
            extensions: BTreeMap::new(),
        }
    }

    /// Constructs a control event
    pub fn control(task_id: impl Into<String>, platform_type: impl Into<String>) -> Self {
        Event {
            kind: EventKind::Control,
            ..Event::task(task_id, platform_type)
        }
    }

    /// Copy with a replaced task id
    pub fn with_task_id(&self, task_id: impl Into<String>) -> Self {
        Event {
            task_id: task_id.into(),
            ..self.clone()
        }
    }

    /// Copy with a replaced task config
    pub fn with_task_config(&self, task_config: TaskConfig) -> Self {
        Event {
            task_config: Some(task_config),
            ..self.clone()
        }
    }

    /// Copy with the terminal flag and outcome replaced
    pub fn with_outcome(&self, terminal: bool, success: bool) -> Self {
        Event {
            terminal,
            success,
            ..self.clone()
        }
    }

    /// Copy with a replaced raw payload
    pub fn with_raw(&self, raw: JsonValue) -> Self {
        Event {
            raw,
            ..self.clone()
        }
    }

    /// Copy with one annotation set
    pub fn with_extension(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut extensions = self.extensions.clone();
        extensions.insert(key.into(), value.into());
        Event {
            extensions,
            ..self.clone()
        }
    }
}
