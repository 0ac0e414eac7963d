//! Nutanix provider config adapter

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::decode;
use super::failure_domain::{NutanixFailureDomain, NutanixResourceIdentifier};
use crate::crd::PlatformType;
use crate::error::Result;

pub const NUTANIX_PROVIDER_KIND: &str = "NutanixMachineProviderConfig";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NutanixMachineProviderConfig {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    /// Prism Element cluster the VM is created in
    pub cluster: NutanixResourceIdentifier,
    pub image: NutanixResourceIdentifier,
    pub subnet: NutanixResourceIdentifier,
    pub vcpus_per_socket: i32,
    pub vcpu_sockets: i32,
    pub memory_size: String,
    pub system_disk_size: String,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// Provider spec of a Nutanix machine
#[derive(Clone, Debug, PartialEq)]
pub struct NutanixProviderConfig {
    provider_config: NutanixMachineProviderConfig,
}

impl NutanixProviderConfig {
    pub(super) fn from_raw(raw: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            provider_config: decode(raw, PlatformType::Nutanix, NUTANIX_PROVIDER_KIND)?,
        })
    }

    pub fn config(&self) -> &NutanixMachineProviderConfig {
        &self.provider_config
    }

    pub fn extract_failure_domain(&self) -> NutanixFailureDomain {
        NutanixFailureDomain {
            cluster: Some(self.provider_config.cluster.clone()),
            subnet: Some(self.provider_config.subnet.clone()),
        }
    }

    pub fn inject_failure_domain(&self, fd: &NutanixFailureDomain) -> Self {
        let mut next = self.clone();
        if let Some(cluster) = &fd.cluster {
            next.provider_config.cluster = cluster.clone();
        }
        if let Some(subnet) = &fd.subnet {
            next.provider_config.subnet = subnet.clone();
        }
        next
    }
}
