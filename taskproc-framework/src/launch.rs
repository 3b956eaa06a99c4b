/// Launch message construction
///
/// [`build_docker_task`] is the pure function from offer + task config +
/// assigned ports to the launch message handed to the driver. It never
/// touches framework state; the caller decides what launches and what
/// the port assignment is.
///
/// The message shape follows the cluster's container conventions:
/// scalar resources tagged with the framework role, a ranges resource
/// holding exactly the assigned host ports, a DOCKER container in
/// BRIDGE networking with `force_pull_image`, and one
/// `(host_port, 8888)` NAT mapping per assigned port.
use serde::{Deserialize, Serialize};

use taskproc_shared::models::task_config::{DockerParameter, TaskConfig, Volume};

use crate::offers::{Offer, PortRange, Resource};

/// Container port every NAT mapping targets
pub const DEFAULT_CONTAINER_PORT: u32 = 8888;

/// Command run inside the container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub value: String,
    pub uris: Vec<String>,
}

/// Host-to-container port NAT mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_port: u32,
    pub container_port: u32,
}

/// Container network mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetworkMode {
    Bridge,
    Host,
}

/// Docker-specific container settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerInfo {
    pub image: String,
    pub network: NetworkMode,
    pub force_pull_image: bool,
    pub port_mappings: Vec<PortMapping>,
}

/// Container engine selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContainerKind {
    Docker,
}

/// Container descriptor in a launch message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub kind: ContainerKind,
    pub docker: DockerInfo,
    pub volumes: Vec<Volume>,
    pub parameters: Vec<DockerParameter>,
}

/// One task launch message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: String,
    pub agent_id: String,
    pub name: String,
    pub resources: Vec<Resource>,
    pub command: CommandInfo,
    pub container: ContainerInfo,
}

/// Builds the launch message for one task on one offer
///
/// `ports` are the host ports the matcher assigned; each becomes a
/// single-port ranges entry and a NAT mapping onto port 8888 inside the
/// container.
pub fn build_docker_task(offer: &Offer, task: &TaskConfig, ports: &[u32], role: &str) -> TaskInfo {
    let task_id = task.task_id();

    let mut resources = vec![
        Resource::scalar("cpus", role, task.cpus),
        Resource::scalar("mem", role, task.mem),
        Resource::scalar("disk", role, task.disk),
    ];
    if !ports.is_empty() {
        resources.push(Resource::ranges(
            "ports",
            role,
            ports
                .iter()
                .map(|&p| PortRange { begin: p, end: p })
                .collect(),
        ));
    }

    TaskInfo {
        name: format!("executor-{}", task_id),
        task_id,
        agent_id: offer.agent_id.clone(),
        resources,
        command: CommandInfo {
            value: task.cmd.clone(),
            uris: Vec::new(),
        },
        container: ContainerInfo {
            kind: ContainerKind::Docker,
            docker: DockerInfo {
                image: task.image.clone(),
                network: NetworkMode::Bridge,
                force_pull_image: true,
                port_mappings: ports
                    .iter()
                    .map(|&p| PortMapping {
                        host_port: p,
                        container_port: DEFAULT_CONTAINER_PORT,
                    })
                    .collect(),
            },
            volumes: task.volumes.clone(),
            parameters: task.docker_parameters.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offers::{Attribute, ResourceValue};
    use taskproc_shared::models::task_config::VolumeMode;

    fn fake_offer() -> Offer {
        Offer {
            id: "fake_offer_id".to_string(),
            agent_id: "fake_agent_id".to_string(),
            hostname: "fake_hostname".to_string(),
            resources: vec![
                Resource::scalar("cpus", "fake_role", 10.0),
                Resource::scalar("mem", "fake_role", 1024.0),
                Resource::scalar("disk", "fake_role", 1000.0),
            ],
            attributes: vec![Attribute {
                name: "pool".to_string(),
                text: "fake_pool_text".to_string(),
            }],
        }
    }

    fn fake_task() -> TaskConfig {
        TaskConfig::builder()
            .name("fake_name")
            .cpus(10.0)
            .mem(1024.0)
            .disk(1000.0)
            .image("fake_image")
            .cmd("echo \"fake\"")
            .volumes(vec![Volume {
                container_path: "fake_container_path".to_string(),
                host_path: "fake_host_path".to_string(),
                mode: VolumeMode::Ro,
            }])
            .build()
            .unwrap()
    }

    #[test]
    fn test_builds_expected_message() {
        let task = fake_task();
        let task_id = task.task_id();
        let info = build_docker_task(&fake_offer(), &task, &[31200], "fake_role");

        assert_eq!(info.task_id, task_id);
        assert_eq!(info.agent_id, "fake_agent_id");
        assert_eq!(info.name, format!("executor-{}", task_id));

        assert_eq!(info.command.value, "echo \"fake\"");
        assert!(info.command.uris.is_empty());

        assert_eq!(info.container.kind, ContainerKind::Docker);
        assert_eq!(info.container.docker.image, "fake_image");
        assert_eq!(info.container.docker.network, NetworkMode::Bridge);
        assert!(info.container.docker.force_pull_image);
        assert_eq!(
            info.container.docker.port_mappings,
            vec![PortMapping {
                host_port: 31200,
                container_port: 8888,
            }]
        );
        assert_eq!(info.container.volumes, task.volumes);
    }

    #[test]
    fn test_resources_tagged_with_role() {
        let info = build_docker_task(&fake_offer(), &fake_task(), &[31200], "fake_role");

        for resource in &info.resources {
            assert_eq!(resource.role, "fake_role");
        }

        let ports = info
            .resources
            .iter()
            .find(|r| r.name == "ports")
            .expect("ports resource");
        assert_eq!(
            ports.value,
            ResourceValue::Ranges(vec![PortRange {
                begin: 31200,
                end: 31200,
            }])
        );
    }

    #[test]
    fn test_no_ports_resource_when_none_assigned() {
        let info = build_docker_task(&fake_offer(), &fake_task(), &[], "fake_role");
        assert!(info.resources.iter().all(|r| r.name != "ports"));
        assert!(info.container.docker.port_mappings.is_empty());
    }

    #[test]
    fn test_scalar_amounts_match_request() {
        let info = build_docker_task(&fake_offer(), &fake_task(), &[], "fake_role");
        let scalar = |name: &str| {
            info.resources
                .iter()
                .find(|r| r.name == name)
                .map(|r| match r.value {
                    ResourceValue::Scalar(v) => v,
                    _ => panic!("expected scalar"),
                })
                .unwrap()
        };
        assert_eq!(scalar("cpus"), 10.0);
        assert_eq!(scalar("mem"), 1024.0);
        assert_eq!(scalar("disk"), 1000.0);
    }
}
