//! GCP provider config adapter

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::decode;
use super::failure_domain::GcpFailureDomain;
use crate::crd::PlatformType;
use crate::error::Result;

pub const GCP_PROVIDER_KIND: &str = "GCPMachineProviderSpec";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GcpMachineProviderSpec {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    pub machine_type: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// Provider spec of a GCP machine
#[derive(Clone, Debug, PartialEq)]
pub struct GcpProviderConfig {
    provider_config: GcpMachineProviderSpec,
}

impl GcpProviderConfig {
    pub(super) fn from_raw(raw: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            provider_config: decode(raw, PlatformType::Gcp, GCP_PROVIDER_KIND)?,
        })
    }

    pub fn config(&self) -> &GcpMachineProviderSpec {
        &self.provider_config
    }

    pub fn extract_failure_domain(&self) -> GcpFailureDomain {
        GcpFailureDomain {
            zone: self.provider_config.zone.clone(),
        }
    }

    pub fn inject_failure_domain(&self, fd: &GcpFailureDomain) -> Self {
        let mut next = self.clone();
        if !fd.zone.is_empty() {
            next.provider_config.zone = fd.zone.clone();
        }
        next
    }
}
