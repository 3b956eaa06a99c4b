/// Cluster transport seams
///
/// The offer/launch transport is an external collaborator. Two traits
/// pin down its interface to the core:
///
/// - [`SchedulerDriver`]: the handle the framework calls *out* through
///   (launch, decline, suppress, revive, kill, acknowledge).
/// - [`Scheduler`]: the callbacks the transport invokes *in* on its own
///   task (registration, offers, status updates, housekeeping).
///
/// Driver methods are treated as non-blocking sends; failures are the
/// transport's to log and retry, which is why nothing here returns a
/// result. Test suites substitute a recording fake for the driver.
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::launch::TaskInfo;
use crate::offers::Offer;

/// Registration struct handed to the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkInfo {
    /// Unix user tasks run as
    pub user: String,

    /// Framework name shown by the master
    pub name: String,

    /// Allocation role offers are tagged with
    pub role: String,

    /// Authentication principal
    pub principal: String,
}

/// Authentication credential presented at registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub principal: String,

    /// Shared secret; None when running unauthenticated
    pub secret: Option<String>,
}

impl Credential {
    /// Loads a credential, reading the secret from an optional file
    ///
    /// A missing secret file is logged at error severity and startup
    /// proceeds without a secret; the caller aborts if that is
    /// unacceptable.
    pub fn load(principal: impl Into<String>, secret_file: Option<&Path>) -> Self {
        let principal = principal.into();
        let secret = secret_file.and_then(|path| {
            if !path.exists() {
                tracing::error!(path = %path.display(), "credential secret file does not exist");
                return None;
            }
            match std::fs::read_to_string(path) {
                Ok(contents) => Some(contents.trim().to_string()),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to read credential secret file");
                    None
                }
            }
        });

        Credential { principal, secret }
    }
}

/// Filter attached to offer declines
///
/// `refuse_seconds` asks the master not to re-offer the same resources
/// for that long.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OfferFilter {
    pub refuse_seconds: f64,
}

impl Default for OfferFilter {
    fn default() -> Self {
        OfferFilter {
            refuse_seconds: 5.0,
        }
    }
}

/// One task status report from the cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Cluster-visible task id the update refers to
    pub task_id: String,

    /// Cluster state string (e.g. `TASK_STAGING`, `TASK_FINISHED`)
    pub state: String,

    /// Human-readable detail, when the agent supplied one
    pub message: Option<String>,

    /// Opaque platform payload carried through into the event
    pub payload: JsonValue,
}

impl StatusUpdate {
    pub fn new(task_id: impl Into<String>, state: impl Into<String>) -> Self {
        StatusUpdate {
            task_id: task_id.into(),
            state: state.into(),
            message: None,
            payload: JsonValue::Null,
        }
    }
}

/// Outbound handle to the cluster transport
#[async_trait]
pub trait SchedulerDriver: Send + Sync {
    /// Launches tasks against one offer
    async fn launch_tasks(&self, offer_id: &str, tasks: &[TaskInfo]);

    /// Declines one offer
    async fn decline_offer(&self, offer_id: &str, filter: &OfferFilter);

    /// Asks the master to stop sending offers
    async fn suppress_offers(&self);

    /// Asks the master to resume sending offers
    async fn revive_offers(&self);

    /// Forwards a kill for a cluster-visible task id
    async fn kill_task(&self, task_id: &str);

    /// Acknowledges receipt of a status update
    async fn acknowledge_status_update(&self, update: &StatusUpdate);

    /// Tears down the transport
    async fn stop(&self);
}

/// Inbound callbacks the transport invokes on the framework
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// The framework registered with the master; `driver` is the handle
    /// for all subsequent outbound calls
    async fn registered(
        &self,
        driver: Arc<dyn SchedulerDriver>,
        framework_id: &str,
        master_info: &JsonValue,
    );

    /// The framework re-registered after a master failover
    async fn reregistered(&self, master_info: &JsonValue);

    /// The transport lost its master connection
    async fn disconnected(&self);

    /// The master advertised resources
    async fn resource_offers(&self, offers: Vec<Offer>);

    /// A previously advertised offer is no longer valid
    async fn offer_rescinded(&self, offer_id: &str);

    /// A task changed state
    async fn status_update(&self, update: StatusUpdate);

    /// An executor sent a framework-level message
    async fn framework_message(&self, executor_id: &str, agent_id: &str, message: &[u8]);

    /// An agent was lost
    async fn slave_lost(&self, agent_id: &str);

    /// A task executor terminated
    async fn executor_lost(&self, executor_id: &str, agent_id: &str, status: i32);

    /// The master reported an unrecoverable framework error
    async fn error(&self, message: &str);
}
