//! Azure provider config adapter

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::decode;
use super::failure_domain::AzureFailureDomain;
use crate::crd::PlatformType;
use crate::error::Result;

pub const AZURE_PROVIDER_KIND: &str = "AzureMachineProviderSpec";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineProviderSpec {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    pub location: String,
    pub vm_size: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet: String,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// Provider spec of an Azure machine
#[derive(Clone, Debug, PartialEq)]
pub struct AzureProviderConfig {
    provider_config: AzureMachineProviderSpec,
}

impl AzureProviderConfig {
    pub(super) fn from_raw(raw: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            provider_config: decode(raw, PlatformType::Azure, AZURE_PROVIDER_KIND)?,
        })
    }

    pub fn config(&self) -> &AzureMachineProviderSpec {
        &self.provider_config
    }

    pub fn extract_failure_domain(&self) -> AzureFailureDomain {
        let subnet = &self.provider_config.subnet;
        AzureFailureDomain {
            zone: self.provider_config.zone.clone(),
            subnet: (!subnet.is_empty()).then(|| subnet.clone()),
        }
    }

    pub fn inject_failure_domain(&self, fd: &AzureFailureDomain) -> Self {
        let mut next = self.clone();
        if !fd.zone.is_empty() {
            next.provider_config.zone = fd.zone.clone();
        }
        if let Some(subnet) = &fd.subnet {
            next.provider_config.subnet = subnet.clone();
        }
        next
    }
}
