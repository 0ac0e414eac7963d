//! Provider config abstraction
//!
//! Every platform stores machine placement in its own, schema-incompatible
//! provider payload. [`ProviderConfig`] wraps one decoded payload per supported
//! platform and exposes a uniform way to read ([`ProviderConfig::extract_failure_domain`])
//! and write ([`ProviderConfig::inject_failure_domain`]) its failure domain.
//!
//! Values are immutable: injection always returns a new config so the same
//! template can be specialised for several indices within one pass.

mod aws;
mod azure;
pub mod failure_domain;
mod gcp;
mod nutanix;
mod openstack;
mod vsphere;

pub use aws::{AwsMachineProviderConfig, AwsPlacement, AwsProviderConfig, AWS_PROVIDER_KIND};
pub use azure::{AzureMachineProviderSpec, AzureProviderConfig, AZURE_PROVIDER_KIND};
pub use failure_domain::{
    AwsFailureDomain, AwsFailureDomainPlacement, AwsFilter, AwsResourceReference,
    AzureFailureDomain, FailureDomain, FailureDomains, GcpFailureDomain, NutanixFailureDomain,
    NutanixIdentifierType, NutanixResourceIdentifier, OpenStackFailureDomain, SubnetFilter,
    SubnetParam, VSphereFailureDomain,
};
pub use gcp::{GcpMachineProviderSpec, GcpProviderConfig, GCP_PROVIDER_KIND};
pub use nutanix::{NutanixMachineProviderConfig, NutanixProviderConfig, NUTANIX_PROVIDER_KIND};
pub use openstack::{
    NetworkParam, OpenStackProviderConfig, OpenstackProviderSpec, RootVolume,
    OPENSTACK_PROVIDER_KIND,
};
pub use vsphere::{VSphereMachineProviderSpec, VSphereProviderConfig, Workspace, VSPHERE_PROVIDER_KIND};

use serde::de::{DeserializeOwned, Error as _};

use crate::crd::PlatformType;
use crate::error::{Error, Result};

/// A decoded provider payload of one platform
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderConfig {
    Aws(AwsProviderConfig),
    Azure(AzureProviderConfig),
    Gcp(GcpProviderConfig),
    OpenStack(OpenStackProviderConfig),
    VSphere(VSphereProviderConfig),
    Nutanix(NutanixProviderConfig),
}

impl ProviderConfig {
    /// Decode a raw provider payload declared to belong to `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigDecode`] when the payload is not the platform's
    /// provider spec kind or is missing a required field.
    pub fn parse(raw: &serde_json::Value, platform: PlatformType) -> Result<Self> {
        Ok(match platform {
            PlatformType::Aws => ProviderConfig::Aws(AwsProviderConfig::from_raw(raw)?),
            PlatformType::Azure => ProviderConfig::Azure(AzureProviderConfig::from_raw(raw)?),
            PlatformType::Gcp => ProviderConfig::Gcp(GcpProviderConfig::from_raw(raw)?),
            PlatformType::OpenStack => {
                ProviderConfig::OpenStack(OpenStackProviderConfig::from_raw(raw)?)
            }
            PlatformType::VSphere => {
                ProviderConfig::VSphere(VSphereProviderConfig::from_raw(raw)?)
            }
            PlatformType::Nutanix => {
                ProviderConfig::Nutanix(NutanixProviderConfig::from_raw(raw)?)
            }
        })
    }

    /// Platform of a raw payload, judged by its `kind`
    pub fn detect_platform(raw: &serde_json::Value) -> Option<PlatformType> {
        match raw.get("kind").and_then(serde_json::Value::as_str)? {
            AWS_PROVIDER_KIND => Some(PlatformType::Aws),
            AZURE_PROVIDER_KIND => Some(PlatformType::Azure),
            GCP_PROVIDER_KIND => Some(PlatformType::Gcp),
            OPENSTACK_PROVIDER_KIND => Some(PlatformType::OpenStack),
            VSPHERE_PROVIDER_KIND => Some(PlatformType::VSphere),
            NUTANIX_PROVIDER_KIND => Some(PlatformType::Nutanix),
            _ => None,
        }
    }

    pub fn platform_type(&self) -> PlatformType {
        match self {
            ProviderConfig::Aws(_) => PlatformType::Aws,
            ProviderConfig::Azure(_) => PlatformType::Azure,
            ProviderConfig::Gcp(_) => PlatformType::Gcp,
            ProviderConfig::OpenStack(_) => PlatformType::OpenStack,
            ProviderConfig::VSphere(_) => PlatformType::VSphere,
            ProviderConfig::Nutanix(_) => PlatformType::Nutanix,
        }
    }

    /// Placement described by this config; empty when none is configured
    pub fn extract_failure_domain(&self) -> FailureDomain {
        match self {
            ProviderConfig::Aws(c) => FailureDomain::Aws(c.extract_failure_domain()),
            ProviderConfig::Azure(c) => FailureDomain::Azure(c.extract_failure_domain()),
            ProviderConfig::Gcp(c) => FailureDomain::Gcp(c.extract_failure_domain()),
            ProviderConfig::OpenStack(c) => FailureDomain::OpenStack(c.extract_failure_domain()),
            ProviderConfig::VSphere(c) => FailureDomain::VSphere(c.extract_failure_domain()),
            ProviderConfig::Nutanix(c) => FailureDomain::Nutanix(c.extract_failure_domain()),
        }
    }

    /// Returns a copy of this config placed in `fd`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FailureDomainMismatch`] when `fd` belongs to another
    /// platform.
    pub fn inject_failure_domain(&self, fd: &FailureDomain) -> Result<Self> {
        Ok(match (self, fd) {
            (ProviderConfig::Aws(c), FailureDomain::Aws(fd)) => {
                ProviderConfig::Aws(c.inject_failure_domain(fd))
            }
            (ProviderConfig::Azure(c), FailureDomain::Azure(fd)) => {
                ProviderConfig::Azure(c.inject_failure_domain(fd))
            }
            (ProviderConfig::Gcp(c), FailureDomain::Gcp(fd)) => {
                ProviderConfig::Gcp(c.inject_failure_domain(fd))
            }
            (ProviderConfig::OpenStack(c), FailureDomain::OpenStack(fd)) => {
                ProviderConfig::OpenStack(c.inject_failure_domain(fd))
            }
            (ProviderConfig::VSphere(c), FailureDomain::VSphere(fd)) => {
                ProviderConfig::VSphere(c.inject_failure_domain(fd))
            }
            (ProviderConfig::Nutanix(c), FailureDomain::Nutanix(fd)) => {
                ProviderConfig::Nutanix(c.inject_failure_domain(fd))
            }
            _ => {
                return Err(Error::FailureDomainMismatch {
                    expected: self.platform_type(),
                    found: fd.platform_type(),
                })
            }
        })
    }

    /// Serialise back into a raw payload for a machine spec
    pub fn raw_config(&self) -> Result<serde_json::Value> {
        Ok(match self {
            ProviderConfig::Aws(c) => serde_json::to_value(c.config())?,
            ProviderConfig::Azure(c) => serde_json::to_value(c.config())?,
            ProviderConfig::Gcp(c) => serde_json::to_value(c.config())?,
            ProviderConfig::OpenStack(c) => serde_json::to_value(c.config())?,
            ProviderConfig::VSphere(c) => serde_json::to_value(c.config())?,
            ProviderConfig::Nutanix(c) => serde_json::to_value(c.config())?,
        })
    }
}

/// Decode `raw` as `T`, requiring the payload's `kind` to be `kind`.
fn decode<T: DeserializeOwned>(
    raw: &serde_json::Value,
    platform: PlatformType,
    kind: &str,
) -> Result<T> {
    let found = raw.get("kind").and_then(serde_json::Value::as_str);
    if found != Some(kind) {
        return Err(Error::ConfigDecode {
            platform,
            source: serde_json::Error::custom(format!(
                "expected kind {}, found {}",
                kind,
                found.unwrap_or("<none>")
            )),
        });
    }

    T::deserialize(raw).map_err(|source| Error::ConfigDecode { platform, source })
}
