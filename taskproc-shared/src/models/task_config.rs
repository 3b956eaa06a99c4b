/// Container task request model
///
/// This module provides the immutable `TaskConfig` record describing one
/// container task: image, command, resource requirements, and container
/// plumbing (volumes, ports, capabilities, docker parameters).
///
/// # Identity
///
/// Every config carries a freshly generated `uuid` tag. The composite
/// task id is derived, never stored:
///
/// ```text
/// task_id = "<name>.<uuid>"
/// ```
///
/// # Immutability
///
/// A `TaskConfig` is never mutated in place. Replacement is the only
/// mutation: the `with_*` constructors produce a copy with one field
/// changed, which keeps configs safe to share across the queue, the
/// registry, and event consumers without locking.
///
/// # Validation
///
/// Resource invariants are enforced at construction via the builder:
/// `cpus > 0`, `mem >= 32`, `disk > 0`. Invalid requests fail with
/// [`TaskConfigError`] and no config is created.
///
/// # Example
///
/// ```
/// use taskproc_shared::models::task_config::TaskConfig;
///
/// let task = TaskConfig::builder()
///     .name("batch-job")
///     .image("ubuntu:xenial")
///     .cmd("/bin/true")
///     .cpus(1.0)
///     .mem(64.0)
///     .disk(100.0)
///     .build()
///     .unwrap();
///
/// assert!(task.task_id().starts_with("batch-job."));
/// ```
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::task_id;

/// Task config validation error
#[derive(Debug, Error)]
pub enum TaskConfigError {
    /// One or more resource invariants were violated
    #[error("Invalid task config: {0}")]
    Invalid(String),
}

/// Volume access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolumeMode {
    /// Read-only
    Ro,
    /// Read-write
    Rw,
}

impl VolumeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeMode::Ro => "RO",
            VolumeMode::Rw => "RW",
        }
    }
}

/// Host path mounted into the container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    /// Path inside the container
    pub container_path: String,

    /// Path on the agent host
    pub host_path: String,

    /// Access mode
    pub mode: VolumeMode,
}

/// Process resource limit applied inside the container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ulimit {
    /// Limit name (e.g. "nofile")
    pub name: String,

    /// Soft limit
    pub soft: u64,

    /// Hard limit
    pub hard: u64,
}

/// Free-form docker daemon parameter (`--<key>=<value>`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerParameter {
    pub key: String,
    pub value: String,
}

/// Immutable container task request
///
/// Construct via [`TaskConfig::builder`]; derive replacement copies via
/// the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TaskConfig {
    /// Human-meaningful task name, first half of the task id
    pub name: String,

    /// Fresh unique tag, second half of the task id. The retry layer
    /// appends attempt suffixes here.
    pub uuid: String,

    /// Container image reference
    pub image: String,

    /// Command executed inside the container
    pub cmd: String,

    /// Requested CPU shares
    #[validate(range(exclusive_min = 0.0, message = "cpus must be > 0"))]
    pub cpus: f64,

    /// Requested memory in MiB
    #[validate(range(min = 32.0, message = "mem must be >= 32"))]
    pub mem: f64,

    /// Requested disk in MiB
    #[validate(range(exclusive_min = 0.0, message = "disk must be > 0"))]
    pub disk: f64,

    /// Volumes mounted into the container
    pub volumes: Vec<Volume>,

    /// Host ports to allocate from the offer; one NAT mapping is created
    /// per entry
    pub ports: Vec<u32>,

    /// Linux capabilities added to the container
    pub cap_add: Vec<String>,

    /// Resource limits applied to the container
    pub ulimit: Vec<Ulimit>,

    /// Extra docker daemon parameters
    pub docker_parameters: Vec<DockerParameter>,
}

impl TaskConfig {
    /// Starts a builder with the default request shape
    pub fn builder() -> TaskConfigBuilder {
        TaskConfigBuilder::default()
    }

    /// Derived composite identity: `<name>.<uuid>`
    pub fn task_id(&self) -> String {
        task_id::task_id(&self.name, &self.uuid)
    }

    /// Copy with a replaced uuid tag
    pub fn with_uuid(&self, uuid: impl Into<String>) -> Self {
        TaskConfig {
            uuid: uuid.into(),
            ..self.clone()
        }
    }

    /// Copy with a replaced name
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        TaskConfig {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// Builder for [`TaskConfig`]
///
/// Defaults describe a minimal no-op container task; `build` generates
/// the uuid tag and enforces the resource invariants.
#[derive(Debug, Clone)]
pub struct TaskConfigBuilder {
    name: String,
    image: String,
    cmd: String,
    cpus: f64,
    mem: f64,
    disk: f64,
    volumes: Vec<Volume>,
    ports: Vec<u32>,
    cap_add: Vec<String>,
    ulimit: Vec<Ulimit>,
    docker_parameters: Vec<DockerParameter>,
}

impl Default for TaskConfigBuilder {
    fn default() -> Self {
        TaskConfigBuilder {
            name: "default".to_string(),
            image: "ubuntu:xenial".to_string(),
            cmd: "/bin/true".to_string(),
            cpus: 0.1,
            mem: 32.0,
            disk: 10.0,
            volumes: Vec::new(),
            ports: Vec::new(),
            cap_add: Vec::new(),
            ulimit: Vec::new(),
            docker_parameters: Vec::new(),
        }
    }
}

impl TaskConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = cmd.into();
        self
    }

    pub fn cpus(mut self, cpus: f64) -> Self {
        self.cpus = cpus;
        self
    }

    pub fn mem(mut self, mem: f64) -> Self {
        self.mem = mem;
        self
    }

    pub fn disk(mut self, disk: f64) -> Self {
        self.disk = disk;
        self
    }

    pub fn volumes(mut self, volumes: Vec<Volume>) -> Self {
        self.volumes = volumes;
        self
    }

    pub fn ports(mut self, ports: Vec<u32>) -> Self {
        self.ports = ports;
        self
    }

    pub fn cap_add(mut self, cap_add: Vec<String>) -> Self {
        self.cap_add = cap_add;
        self
    }

    pub fn ulimit(mut self, ulimit: Vec<Ulimit>) -> Self {
        self.ulimit = ulimit;
        self
    }

    pub fn docker_parameters(mut self, docker_parameters: Vec<DockerParameter>) -> Self {
        self.docker_parameters = docker_parameters;
        self
    }

    /// Finalizes the config, generating the uuid tag
    ///
    /// # Errors
    ///
    /// Returns [`TaskConfigError::Invalid`] if a resource invariant is
    /// violated. No config is created in that case.
    pub fn build(self) -> Result<TaskConfig, TaskConfigError> {
        let config = TaskConfig {
            name: self.name,
            uuid: Uuid::new_v4().to_string(),
            image: self.image,
            cmd: self.cmd,
            cpus: self.cpus,
            mem: self.mem,
            disk: self.disk,
            volumes: self.volumes,
            ports: self.ports,
            cap_add: self.cap_add,
            ulimit: self.ulimit,
            docker_parameters: self.docker_parameters,
        };

        config
            .validate()
            .map_err(|e| TaskConfigError::Invalid(e.to_string()))?;

        Ok(config)
    }
}
