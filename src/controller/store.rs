//! Cluster access used by the reconciliation pass
//!
//! [`ClusterStore`] is everything a pass reads from or writes to the cluster.
//! [`KubeStore`] implements it over the Kubernetes API.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams},
    client::Client,
    ResourceExt,
};
use tracing::debug;

use crate::crd::{ControlPlaneMachineSet, ControlPlaneMachineSetStatus, Machine};
use crate::error::{Error, Result};
use crate::labels::{label_selector, CONTROL_PLANE_NODE_LABEL};

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "control-plane-machine-set-operator";

#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_machine_set(&self, namespace: &str, name: &str) -> Result<ControlPlaneMachineSet>;

    /// Machines in `namespace` matching `selector`
    async fn list_machines(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Machine>>;

    async fn list_control_plane_nodes(&self) -> Result<Vec<Node>>;

    /// Write `status` to the status subresource.
    ///
    /// The write is conditional on `set`'s resourceVersion; a concurrent change
    /// fails with [`Error::Conflict`].
    async fn patch_status(
        &self,
        set: &ControlPlaneMachineSet,
        status: &ControlPlaneMachineSetStatus,
    ) -> Result<ControlPlaneMachineSet>;

    async fn create_machine(&self, machine: &Machine) -> Result<Machine>;

    async fn delete_machine(&self, namespace: &str, name: &str) -> Result<()>;
}

/// [`ClusterStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Merge patch body for a status write.
///
/// The embedded resourceVersion turns the merge patch into a compare-and-swap.
fn status_patch(set: &ControlPlaneMachineSet, status: &ControlPlaneMachineSetStatus) -> serde_json::Value {
    serde_json::json!({
        "metadata": { "resourceVersion": set.resource_version() },
        "status": status,
    })
}

fn status_patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_machine_set(&self, namespace: &str, name: &str) -> Result<ControlPlaneMachineSet> {
        let api: Api<ControlPlaneMachineSet> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| Error::read(format!("ControlPlaneMachineSet {}/{}", namespace, name), e))
    }

    async fn list_machines(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Machine>> {
        let api: Api<Machine> = Api::namespaced(self.client.clone(), namespace);
        let selector = label_selector(selector)?;
        let machines = api
            .list(&ListParams::default().labels_from(&selector))
            .await
            .map_err(|e| Error::read(format!("Machines in {} ({})", namespace, selector), e))?;
        Ok(machines.items)
    }

    async fn list_control_plane_nodes(&self) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default().labels(CONTROL_PLANE_NODE_LABEL))
            .await
            .map_err(|e| Error::read("control plane Nodes", e))?;
        Ok(nodes.items)
    }

    async fn patch_status(
        &self,
        set: &ControlPlaneMachineSet,
        status: &ControlPlaneMachineSetStatus,
    ) -> Result<ControlPlaneMachineSet> {
        let namespace = set.namespace().unwrap_or_default();
        let api: Api<ControlPlaneMachineSet> = Api::namespaced(self.client.clone(), &namespace);

        let patch = status_patch(set, status);
        debug!("Patching status of {}/{}", namespace, set.name_any());

        api.patch_status(&set.name_any(), &status_patch_params(), &Patch::Merge(&patch))
        .await
        .map_err(|e| Error::from_write(&format!("status of {}/{}", namespace, set.name_any()), e))
    }

    async fn create_machine(&self, machine: &Machine) -> Result<Machine> {
        let namespace = machine.namespace().unwrap_or_default();
        let api: Api<Machine> = Api::namespaced(self.client.clone(), &namespace);
        api.create(
            &PostParams {
                field_manager: Some(FIELD_MANAGER.to_string()),
                ..Default::default()
            },
            machine,
        )
        .await
        .map_err(|e| Error::from_write(&format!("Machine {}/{}", namespace, machine.name_any()), e))
    }

    async fn delete_machine(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Machine> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| Error::from_write(&format!("Machine {}/{}", namespace, name), e))?;
        Ok(())
    }
}
