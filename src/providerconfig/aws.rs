//! AWS provider config adapter

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::failure_domain::{AwsFailureDomain, AwsFailureDomainPlacement, AwsResourceReference};
use super::decode;
use crate::crd::PlatformType;
use crate::error::Result;

pub const AWS_PROVIDER_KIND: &str = "AWSMachineProviderConfig";

/// Native `AWSMachineProviderConfig` payload.
///
/// Placement fields are modelled; everything else is kept as written.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsMachineProviderConfig {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    pub instance_type: String,
    #[serde(default, skip_serializing_if = "AwsPlacement::is_empty")]
    pub placement: AwsPlacement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<AwsResourceReference>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AwsPlacement {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub availability_zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenancy: Option<String>,
}

impl AwsPlacement {
    fn is_empty(&self) -> bool {
        self.region.is_empty() && self.availability_zone.is_empty() && self.tenancy.is_none()
    }
}

/// Provider spec of an AWS machine
#[derive(Clone, Debug, PartialEq)]
pub struct AwsProviderConfig {
    provider_config: AwsMachineProviderConfig,
}

impl AwsProviderConfig {
    pub(super) fn from_raw(raw: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            provider_config: decode(raw, PlatformType::Aws, AWS_PROVIDER_KIND)?,
        })
    }

    pub fn config(&self) -> &AwsMachineProviderConfig {
        &self.provider_config
    }

    pub fn extract_failure_domain(&self) -> AwsFailureDomain {
        AwsFailureDomain {
            placement: AwsFailureDomainPlacement {
                availability_zone: self.provider_config.placement.availability_zone.clone(),
            },
            subnet: self.provider_config.subnet.clone(),
        }
    }

    pub fn inject_failure_domain(&self, fd: &AwsFailureDomain) -> Self {
        let mut next = self.clone();
        if !fd.placement.availability_zone.is_empty() {
            next.provider_config.placement.availability_zone =
                fd.placement.availability_zone.clone();
        }
        if let Some(subnet) = &fd.subnet {
            next.provider_config.subnet = Some(subnet.clone());
        }
        next
    }
}
