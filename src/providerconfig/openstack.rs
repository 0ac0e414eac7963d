//! OpenStack provider config adapter
//!
//! OpenStack places a machine with three independent fields: the compute
//! availability zone, the availability zone of the root volume, and the subnet
//! the primary port is attached to. Subnets live inside the `networks` list and
//! may be referenced either by UUID or by a name filter, so injection has to
//! search the list before adding anything to it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::decode;
use super::failure_domain::{OpenStackFailureDomain, SubnetParam};
use crate::crd::PlatformType;
use crate::error::{Error, Result};

pub const OPENSTACK_PROVIDER_KIND: &str = "OpenstackProviderSpec";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackProviderSpec {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    pub flavor: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub availability_zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_volume: Option<RootVolume>,
    /// UUID of the subnet the primary port is attached to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_subnet: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkParam>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RootVolume {
    #[serde(rename = "sourceUUID", default, skip_serializing_if = "String::is_empty")]
    pub source_uuid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub volume_type: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub disk_size: i32,
    /// Storage availability zone
    #[serde(rename = "availabilityZone", default, skip_serializing_if = "String::is_empty")]
    pub zone: String,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParam {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<SubnetParam>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// Provider spec of an OpenStack machine
#[derive(Clone, Debug, PartialEq)]
pub struct OpenStackProviderConfig {
    provider_config: OpenstackProviderSpec,
}

impl OpenStackProviderConfig {
    pub(super) fn from_raw(raw: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            provider_config: decode(raw, PlatformType::OpenStack, OPENSTACK_PROVIDER_KIND)?,
        })
    }

    pub fn config(&self) -> &OpenstackProviderSpec {
        &self.provider_config
    }

    /// Find a configured subnet matching `subnet`.
    ///
    /// A UUID takes precedence; the name filter is only consulted when the
    /// reference carries no UUID.
    pub fn find_subnet(&self, subnet: &SubnetParam) -> Result<&SubnetParam> {
        let mut subnets = self
            .provider_config
            .networks
            .iter()
            .flat_map(|network| network.subnets.iter());

        if !subnet.uuid.is_empty() {
            return subnets
                .find(|candidate| candidate.uuid == subnet.uuid)
                .ok_or_else(|| {
                    Error::Lookup(format!(
                        "primary subnet {} not specified on machine",
                        subnet.uuid
                    ))
                });
        }

        if !subnet.filter.name.is_empty() {
            return subnets
                .find(|candidate| candidate.filter.name == subnet.filter.name)
                .ok_or_else(|| {
                    Error::Lookup(format!(
                        "primary subnet {} not specified on machine",
                        subnet.filter.name
                    ))
                });
        }

        Err(Error::Lookup(
            "subnet reference has neither a UUID nor a name filter".to_string(),
        ))
    }

    pub fn extract_failure_domain(&self) -> OpenStackFailureDomain {
        let config = &self.provider_config;

        let subnet = if !config.primary_subnet.is_empty() {
            Some(SubnetParam::with_uuid(config.primary_subnet.clone()))
        } else {
            config
                .networks
                .first()
                .and_then(|network| network.subnets.first())
                .filter(|subnet| !subnet.is_unset())
                .cloned()
        };

        OpenStackFailureDomain {
            compute_zone: config.availability_zone.clone(),
            storage_zone: config
                .root_volume
                .as_ref()
                .map(|volume| volume.zone.clone())
                .unwrap_or_default(),
            subnet,
        }
    }

    /// Returns a new config placed in `fd`.
    ///
    /// The storage zone only applies to machines booting from a root volume.
    /// A subnet is added as a new network entry only when no configured
    /// subnet already matches it, so repeated injection never grows the list.
    /// A subnet named by filter goes first so it reads back as the primary one.
    pub fn inject_failure_domain(&self, fd: &OpenStackFailureDomain) -> Self {
        let mut next = self.clone();

        if !fd.compute_zone.is_empty() {
            next.provider_config.availability_zone = fd.compute_zone.clone();
        }

        if !fd.storage_zone.is_empty() {
            if let Some(volume) = next.provider_config.root_volume.as_mut() {
                volume.zone = fd.storage_zone.clone();
            }
        }

        if let Some(subnet) = fd.subnet.as_ref().filter(|subnet| !subnet.is_unset()) {
            if self.find_subnet(subnet).is_err() {
                let network = NetworkParam {
                    subnets: vec![subnet.clone()],
                    ..Default::default()
                };
                if subnet.uuid.is_empty() {
                    // Without primarySubnet extraction reads the first network
                    next.provider_config.networks.insert(0, network);
                } else {
                    next.provider_config.networks.push(network);
                }
            }
            if !subnet.uuid.is_empty() {
                next.provider_config.primary_subnet = subnet.uuid.clone();
            }
        }

        next
    }
}
