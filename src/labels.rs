//! Label constants and label selector helpers shared by the CRDs and the
//! controller.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::core::Selector;

use crate::error::{Error, Result};

// ============================================================================
// Machine API labels
// ============================================================================

/// Infrastructure ID of the cluster a machine belongs to
pub const CLUSTER_ID_LABEL: &str = "machine.openshift.io/cluster-api-cluster";

/// Role of the machine; `master` for control plane machines
pub const MACHINE_ROLE_LABEL: &str = "machine.openshift.io/cluster-api-machine-role";

/// Type of the machine; `master` for control plane machines
pub const MACHINE_TYPE_LABEL: &str = "machine.openshift.io/cluster-api-machine-type";

/// Value of the role and type labels on control plane machines
pub const CONTROL_PLANE_ROLE: &str = "master";

/// Explicit control plane index of a machine, written on machines we create
pub const MACHINE_INDEX_LABEL: &str = "machine.openshift.io/control-plane-machine-set-index";

// ============================================================================
// Node labels
// ============================================================================

/// Role label carried by control plane nodes
pub const CONTROL_PLANE_NODE_LABEL: &str = "node-role.kubernetes.io/master";

/// Convert a selector from a spec into the form kube lists and matches with.
///
/// Unknown operators are rejected; an empty selector matches everything.
pub fn label_selector(selector: &LabelSelector) -> Result<Selector> {
    Selector::try_from(selector.clone()).map_err(|e| Error::InvalidSelector(e.to_string()))
}
