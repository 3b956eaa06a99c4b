/// Resource offer model and matching arithmetic
///
/// An [`Offer`] is a bundle of resources (cpus, mem, disk, port ranges)
/// advertised by the cluster master for a bounded time, tagged with
/// free-form attributes such as the placement pool.
///
/// [`ResourceSummary`] flattens an offer into plain numbers plus the
/// expanded set of available ports, and supports the subtraction the
/// matching loop performs as tasks are packed into one offer:
///
/// ```text
/// summary = ResourceSummary::from_offer(&offer)
/// for task in queue {
///     if let Some(ports) = summary.allocate(&task) {
///         // build a launch message with `ports`
///     }
/// }
/// ```
///
/// Port assignment always hands out the lowest available ports first.
use serde::{Deserialize, Serialize};

use taskproc_shared::models::task_config::TaskConfig;

/// Inclusive port range advertised in an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub begin: u32,
    pub end: u32,
}

/// Resource payload: a scalar amount or a set of ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceValue {
    Scalar(f64),
    Ranges(Vec<PortRange>),
}

/// One named resource in an offer or launch message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name: "cpus", "mem", "disk", "ports"
    pub name: String,

    /// Allocation role the resource is tagged with
    pub role: String,

    /// Scalar amount or ranges
    pub value: ResourceValue,
}

impl Resource {
    pub fn scalar(name: impl Into<String>, role: impl Into<String>, value: f64) -> Self {
        Resource {
            name: name.into(),
            role: role.into(),
            value: ResourceValue::Scalar(value),
        }
    }

    pub fn ranges(name: impl Into<String>, role: impl Into<String>, ranges: Vec<PortRange>) -> Self {
        Resource {
            name: name.into(),
            role: role.into(),
            value: ResourceValue::Ranges(ranges),
        }
    }
}

/// Free-form text attribute on an offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub text: String,
}

/// Resource bundle advertised by the master
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// Offer identity, echoed back on launch/decline
    pub id: String,

    /// Agent the resources live on
    pub agent_id: String,

    /// Agent hostname, for logging
    pub hostname: String,

    /// Advertised resources
    pub resources: Vec<Resource>,

    /// Placement attributes
    pub attributes: Vec<Attribute>,
}

impl Offer {
    /// Text value of a named attribute, if present
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.text.as_str())
    }
}

/// Flattened view of an offer's resources, consumed as tasks are packed
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSummary {
    pub cpus: f64,
    pub mem: f64,
    pub disk: f64,

    /// Available ports, ascending
    pub ports: Vec<u32>,
}

impl ResourceSummary {
    /// Summarizes an offer: scalar totals plus expanded port ranges
    pub fn from_offer(offer: &Offer) -> Self {
        let mut summary = ResourceSummary {
            cpus: 0.0,
            mem: 0.0,
            disk: 0.0,
            ports: Vec::new(),
        };

        for resource in &offer.resources {
            match (&resource.name[..], &resource.value) {
                ("cpus", ResourceValue::Scalar(v)) => summary.cpus += v,
                ("mem", ResourceValue::Scalar(v)) => summary.mem += v,
                ("disk", ResourceValue::Scalar(v)) => summary.disk += v,
                ("ports", ResourceValue::Ranges(ranges)) => {
                    for range in ranges {
                        summary.ports.extend(range.begin..=range.end);
                    }
                }
                _ => {}
            }
        }

        summary.ports.sort_unstable();
        summary.ports.dedup();
        summary
    }

    /// Whether the remaining resources satisfy a task's requirements
    pub fn can_fit(&self, task: &TaskConfig) -> bool {
        task.cpus <= self.cpus
            && task.mem <= self.mem
            && task.disk <= self.disk
            && task.ports.len() <= self.ports.len()
    }

    /// Consumes a task's resources from the summary
    ///
    /// On success returns the host ports assigned to the task (lowest
    /// available first, one per requested port) and subtracts scalars
    /// and ports from the remaining pool. On insufficient resources the
    /// summary is left untouched and None is returned.
    pub fn allocate(&mut self, task: &TaskConfig) -> Option<Vec<u32>> {
        if !self.can_fit(task) {
            return None;
        }

        self.cpus -= task.cpus;
        self.mem -= task.mem;
        self.disk -= task.disk;
        let assigned: Vec<u32> = self.ports.drain(..task.ports.len()).collect();
        Some(assigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_offer() -> Offer {
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

    fn fake_task(cpus: f64, mem: f64, disk: f64, ports: usize) -> TaskConfig {
        TaskConfig::builder()
            .name("fake_name")
            .cpus(cpus)
            .mem(mem)
            .disk(disk)
            .ports(vec![8888; ports])
            .build()
            .unwrap()
    }

    #[test]
    fn test_summary_expands_port_ranges_inclusive() {
        let summary = ResourceSummary::from_offer(&fake_offer());
        assert_eq!(summary.cpus, 10.0);
        assert_eq!(summary.mem, 1024.0);
        assert_eq!(summary.disk, 1000.0);
        assert_eq!(summary.ports.len(), 301);
        assert_eq!(summary.ports.first(), Some(&31200));
        assert_eq!(summary.ports.last(), Some(&31500));
    }

    #[test]
    fn test_attribute_lookup() {
        let offer = fake_offer();
        assert_eq!(offer.attribute("pool"), Some("fake_pool_text"));
        assert_eq!(offer.attribute("rack"), None);
    }

    #[test]
    fn test_allocate_subtracts_resources() {
        let mut summary = ResourceSummary::from_offer(&fake_offer());
        let ports = summary.allocate(&fake_task(4.0, 512.0, 100.0, 2)).unwrap();

        assert_eq!(ports, vec![31200, 31201]);
        assert_eq!(summary.cpus, 6.0);
        assert_eq!(summary.mem, 512.0);
        assert_eq!(summary.disk, 900.0);
        assert_eq!(summary.ports.first(), Some(&31202));
    }

    #[test]
    fn test_allocate_insufficient_leaves_summary_untouched() {
        let mut summary = ResourceSummary::from_offer(&fake_offer());
        let before = summary.clone();

        assert!(summary.allocate(&fake_task(20.0, 2048.0, 2000.0, 0)).is_none());
        assert_eq!(summary, before);
    }

    #[test]
    fn test_allocate_lowest_ports_first() {
        let mut summary = ResourceSummary::from_offer(&fake_offer());
        let first = summary.allocate(&fake_task(1.0, 32.0, 10.0, 1)).unwrap();
        let second = summary.allocate(&fake_task(1.0, 32.0, 10.0, 1)).unwrap();
        assert_eq!(first, vec![31200]);
        assert_eq!(second, vec![31201]);
    }

    #[test]
    fn test_acceptance_is_monotone_in_resources() {
        // Removing another task from the queue can only leave more
        // resources behind, so a task that fits keeps fitting.
        let mut summary = ResourceSummary::from_offer(&fake_offer());
        let small = fake_task(2.0, 64.0, 50.0, 1);

        let mut contended = summary.clone();
        contended.allocate(&fake_task(4.0, 512.0, 100.0, 2)).unwrap();

        assert!(contended.can_fit(&small));
        assert!(summary.can_fit(&small));
        summary.allocate(&small).unwrap();
    }
}
