//! vSphere provider config adapter

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::decode;
use super::failure_domain::VSphereFailureDomain;
use crate::crd::PlatformType;
use crate::error::Result;

pub const VSPHERE_PROVIDER_KIND: &str = "VSphereMachineProviderSpec";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VSphereMachineProviderSpec {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    /// VM template the machine is cloned from
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<Workspace>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// Where in vCenter the VM is created
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Workspace {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub datacenter: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub folder: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub datastore: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_pool: String,
}

/// Provider spec of a vSphere machine
#[derive(Clone, Debug, PartialEq)]
pub struct VSphereProviderConfig {
    provider_config: VSphereMachineProviderSpec,
}

impl VSphereProviderConfig {
    pub(super) fn from_raw(raw: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            provider_config: decode(raw, PlatformType::VSphere, VSPHERE_PROVIDER_KIND)?,
        })
    }

    pub fn config(&self) -> &VSphereMachineProviderSpec {
        &self.provider_config
    }

    pub fn extract_failure_domain(&self) -> VSphereFailureDomain {
        let workspace = self.provider_config.workspace.clone().unwrap_or_default();
        VSphereFailureDomain {
            server: workspace.server,
            datacenter: workspace.datacenter,
            datastore: workspace.datastore,
            resource_pool: workspace.resource_pool,
            folder: workspace.folder,
        }
    }

    pub fn inject_failure_domain(&self, fd: &VSphereFailureDomain) -> Self {
        let mut next = self.clone();
        if fd.is_empty() {
            return next;
        }

        let workspace = next.provider_config.workspace.get_or_insert_with(Workspace::default);
        let fields = [
            (&mut workspace.server, &fd.server),
            (&mut workspace.datacenter, &fd.datacenter),
            (&mut workspace.datastore, &fd.datastore),
            (&mut workspace.resource_pool, &fd.resource_pool),
            (&mut workspace.folder, &fd.folder),
        ];
        for (target, value) in fields {
            if !value.is_empty() {
                *target = value.clone();
            }
        }
        next
    }
}
