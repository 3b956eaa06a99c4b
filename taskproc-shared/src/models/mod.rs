/// Shared data model
///
/// Immutable records flowing between the framework, wrapping executors,
/// and consumers:
///
/// - `task_config`: the container task request and its builder
/// - `event`: one task lifecycle transition
/// - `metadata`: in-flight task bookkeeping inside the registry
pub mod event;
pub mod metadata;
pub mod task_config;

pub use event::{Event, EventKind};
pub use metadata::{task_state, TaskMetadata};
pub use task_config::{
    DockerParameter, TaskConfig, TaskConfigBuilder, TaskConfigError, Ulimit, Volume, VolumeMode,
};
