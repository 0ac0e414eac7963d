//! Provider-tagged failure domains
//!
//! A failure domain says *where* a control plane machine is placed. Every
//! platform describes placement differently, so [`FailureDomain`] is a closed
//! variant with one case per supported provider. The per-provider structs are
//! also used verbatim in the `failureDomains` section of the
//! ControlPlaneMachineSet template.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::PlatformType;

/// Placement of a control plane machine on one platform
#[derive(Clone, Debug, PartialEq)]
pub enum FailureDomain {
    Aws(AwsFailureDomain),
    Azure(AzureFailureDomain),
    Gcp(GcpFailureDomain),
    OpenStack(OpenStackFailureDomain),
    VSphere(VSphereFailureDomain),
    Nutanix(NutanixFailureDomain),
}

impl FailureDomain {
    pub fn platform_type(&self) -> PlatformType {
        match self {
            FailureDomain::Aws(_) => PlatformType::Aws,
            FailureDomain::Azure(_) => PlatformType::Azure,
            FailureDomain::Gcp(_) => PlatformType::Gcp,
            FailureDomain::OpenStack(_) => PlatformType::OpenStack,
            FailureDomain::VSphere(_) => PlatformType::VSphere,
            FailureDomain::Nutanix(_) => PlatformType::Nutanix,
        }
    }

    /// True when no placement field is set (single-zone deployments)
    pub fn is_empty(&self) -> bool {
        match self {
            FailureDomain::Aws(fd) => fd.is_empty(),
            FailureDomain::Azure(fd) => fd.is_empty(),
            FailureDomain::Gcp(fd) => fd.is_empty(),
            FailureDomain::OpenStack(fd) => fd.is_empty(),
            FailureDomain::VSphere(fd) => fd.is_empty(),
            FailureDomain::Nutanix(fd) => fd.is_empty(),
        }
    }

    /// Placement equality as defined by each provider.
    ///
    /// Failure domains of different platforms never match.
    pub fn matches(&self, other: &FailureDomain) -> bool {
        match (self, other) {
            (FailureDomain::Aws(a), FailureDomain::Aws(b)) => a.matches(b),
            (FailureDomain::Azure(a), FailureDomain::Azure(b)) => a == b,
            (FailureDomain::Gcp(a), FailureDomain::Gcp(b)) => a == b,
            (FailureDomain::OpenStack(a), FailureDomain::OpenStack(b)) => a.matches(b),
            (FailureDomain::VSphere(a), FailureDomain::VSphere(b)) => a == b,
            (FailureDomain::Nutanix(a), FailureDomain::Nutanix(b)) => a.matches(b),
            _ => false,
        }
    }
}

impl fmt::Display for FailureDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureDomain::Aws(fd) => {
                write!(f, "AWSFailureDomain{{AvailabilityZone:{}", fd.placement.availability_zone)?;
                if let Some(subnet) = &fd.subnet {
                    write!(f, ", Subnet:{}", subnet)?;
                }
                f.write_str("}")
            }
            FailureDomain::Azure(fd) => {
                write!(f, "AzureFailureDomain{{Zone:{}", fd.zone)?;
                if let Some(subnet) = &fd.subnet {
                    write!(f, ", Subnet:{}", subnet)?;
                }
                f.write_str("}")
            }
            FailureDomain::Gcp(fd) => write!(f, "GCPFailureDomain{{Zone:{}}}", fd.zone),
            FailureDomain::OpenStack(fd) => {
                write!(
                    f,
                    "OpenStackFailureDomain{{ComputeZone:{}, StorageZone:{}",
                    fd.compute_zone, fd.storage_zone
                )?;
                if let Some(subnet) = &fd.subnet {
                    if !subnet.uuid.is_empty() {
                        write!(f, ", Subnet:{}", subnet.uuid)?;
                    } else {
                        write!(f, ", Subnet:{}", subnet.filter.name)?;
                    }
                }
                f.write_str("}")
            }
            FailureDomain::VSphere(fd) => write!(
                f,
                "VSphereFailureDomain{{Datacenter:{}, Datastore:{}, ResourcePool:{}}}",
                fd.datacenter, fd.datastore, fd.resource_pool
            ),
            FailureDomain::Nutanix(fd) => {
                f.write_str("NutanixFailureDomain{")?;
                if let Some(cluster) = &fd.cluster {
                    write!(f, "Cluster:{}", cluster)?;
                }
                if let Some(subnet) = &fd.subnet {
                    write!(f, ", Subnet:{}", subnet)?;
                }
                f.write_str("}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// AWS
// ---------------------------------------------------------------------------

/// Reference to an AWS resource by ID, ARN or filters
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AwsResourceReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<AwsFilter>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct AwsFilter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl fmt::Display for AwsResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.id {
            return write!(f, "id:{}", id);
        }
        if let Some(arn) = &self.arn {
            return write!(f, "arn:{}", arn);
        }
        let filters = self
            .filters
            .iter()
            .flatten()
            .map(|filter| format!("{}={}", filter.name, filter.values.join(",")))
            .collect::<Vec<_>>();
        write!(f, "filters:[{}]", filters.join(" "))
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AwsFailureDomainPlacement {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub availability_zone: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AwsFailureDomain {
    #[serde(default)]
    pub placement: AwsFailureDomainPlacement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<AwsResourceReference>,
}

impl AwsFailureDomain {
    pub fn is_empty(&self) -> bool {
        self.placement.availability_zone.is_empty() && self.subnet.is_none()
    }

    /// Zones must agree; a subnet is only compared when both sides name one.
    pub fn matches(&self, other: &AwsFailureDomain) -> bool {
        if self.placement.availability_zone != other.placement.availability_zone {
            return false;
        }
        match (&self.subnet, &other.subnet) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Azure
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AzureFailureDomain {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
}

impl AzureFailureDomain {
    pub fn is_empty(&self) -> bool {
        self.zone.is_empty() && self.subnet.is_none()
    }
}

// ---------------------------------------------------------------------------
// GCP
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GcpFailureDomain {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,
}

impl GcpFailureDomain {
    pub fn is_empty(&self) -> bool {
        self.zone.is_empty()
    }
}

// ---------------------------------------------------------------------------
// OpenStack
// ---------------------------------------------------------------------------

/// Filter selecting an OpenStack subnet by its attributes
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetFilter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tags: String,
    /// Remaining filter attributes, preserved as written
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl SubnetFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.tags.is_empty() && self.other.is_empty()
    }
}

/// A subnet reference: either a UUID or a filter
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetParam {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "SubnetFilter::is_empty")]
    pub filter: SubnetFilter,
}

impl SubnetParam {
    pub fn with_uuid(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            ..Default::default()
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            filter: SubnetFilter {
                name: name.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Neither a UUID nor a name filter: nothing to look up
    pub fn is_unset(&self) -> bool {
        self.uuid.is_empty() && self.filter.name.is_empty()
    }

    /// Same subnet by UUID when both carry one, otherwise by filter name
    pub fn refers_to_same_subnet(&self, other: &SubnetParam) -> bool {
        if !self.uuid.is_empty() && !other.uuid.is_empty() {
            return self.uuid == other.uuid;
        }
        if !self.filter.name.is_empty() && !other.filter.name.is_empty() {
            return self.filter.name == other.filter.name;
        }
        self == other
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenStackFailureDomain {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub compute_zone: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<SubnetParam>,
}

impl OpenStackFailureDomain {
    pub fn is_empty(&self) -> bool {
        self.compute_zone.is_empty() && self.storage_zone.is_empty() && self.subnet.is_none()
    }

    pub fn matches(&self, other: &OpenStackFailureDomain) -> bool {
        if self.compute_zone != other.compute_zone || self.storage_zone != other.storage_zone {
            return false;
        }
        match (&self.subnet, &other.subnet) {
            (None, None) => true,
            (Some(a), Some(b)) => a.refers_to_same_subnet(b),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// vSphere
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VSphereFailureDomain {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub datacenter: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub datastore: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_pool: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub folder: String,
}

impl VSphereFailureDomain {
    pub fn is_empty(&self) -> bool {
        self.server.is_empty()
            && self.datacenter.is_empty()
            && self.datastore.is_empty()
            && self.resource_pool.is_empty()
            && self.folder.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Nutanix
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum NutanixIdentifierType {
    #[serde(rename = "uuid")]
    Uuid,
    #[serde(rename = "name")]
    Name,
}

/// Identity of a Prism Central resource (cluster, image, subnet)
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NutanixResourceIdentifier {
    #[serde(rename = "type")]
    pub type_: NutanixIdentifierType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl NutanixResourceIdentifier {
    pub fn uuid(uuid: impl Into<String>) -> Self {
        Self {
            type_: NutanixIdentifierType::Uuid,
            uuid: Some(uuid.into()),
            name: None,
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            type_: NutanixIdentifierType::Name,
            uuid: None,
            name: Some(name.into()),
        }
    }

    /// The value selected by the identifier type
    pub fn key(&self) -> Option<&str> {
        match self.type_ {
            NutanixIdentifierType::Uuid => self.uuid.as_deref(),
            NutanixIdentifierType::Name => self.name.as_deref(),
        }
    }

    pub fn matches(&self, other: &NutanixResourceIdentifier) -> bool {
        self.type_ == other.type_ && self.key().is_some() && self.key() == other.key()
    }
}

impl fmt::Display for NutanixResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_ {
            NutanixIdentifierType::Uuid => write!(f, "uuid:{}", self.key().unwrap_or_default()),
            NutanixIdentifierType::Name => write!(f, "name:{}", self.key().unwrap_or_default()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NutanixFailureDomain {
    /// Prism Element cluster hosting the VM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<NutanixResourceIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<NutanixResourceIdentifier>,
}

impl NutanixFailureDomain {
    pub fn is_empty(&self) -> bool {
        self.cluster.is_none() && self.subnet.is_none()
    }

    pub fn matches(&self, other: &NutanixFailureDomain) -> bool {
        let same = |a: &Option<NutanixResourceIdentifier>, b: &Option<NutanixResourceIdentifier>| {
            match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.matches(b),
                _ => false,
            }
        };
        same(&self.cluster, &other.cluster) && same(&self.subnet, &other.subnet)
    }
}

// ---------------------------------------------------------------------------
// Template failure domain lists
// ---------------------------------------------------------------------------

/// Failure domains the set spreads its indices across
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailureDomains {
    pub platform: PlatformType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aws: Vec<AwsFailureDomain>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub azure: Vec<AzureFailureDomain>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gcp: Vec<GcpFailureDomain>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub openstack: Vec<OpenStackFailureDomain>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vsphere: Vec<VSphereFailureDomain>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nutanix: Vec<NutanixFailureDomain>,
}

impl FailureDomains {
    /// The declared platform's list, in declaration order
    pub fn to_failure_domains(&self) -> Vec<FailureDomain> {
        match self.platform {
            PlatformType::Aws => self.aws.iter().cloned().map(FailureDomain::Aws).collect(),
            PlatformType::Azure => self.azure.iter().cloned().map(FailureDomain::Azure).collect(),
            PlatformType::Gcp => self.gcp.iter().cloned().map(FailureDomain::Gcp).collect(),
            PlatformType::OpenStack => self
                .openstack
                .iter()
                .cloned()
                .map(FailureDomain::OpenStack)
                .collect(),
            PlatformType::VSphere => self
                .vsphere
                .iter()
                .cloned()
                .map(FailureDomain::VSphere)
                .collect(),
            PlatformType::Nutanix => self
                .nutanix
                .iter()
                .cloned()
                .map(FailureDomain::Nutanix)
                .collect(),
        }
    }

    /// Platforms other than the declared one that carry entries
    pub fn foreign_platforms(&self) -> Vec<PlatformType> {
        [
            (PlatformType::Aws, self.aws.is_empty()),
            (PlatformType::Azure, self.azure.is_empty()),
            (PlatformType::Gcp, self.gcp.is_empty()),
            (PlatformType::OpenStack, self.openstack.is_empty()),
            (PlatformType::VSphere, self.vsphere.is_empty()),
            (PlatformType::Nutanix, self.nutanix.is_empty()),
        ]
        .into_iter()
        .filter(|(platform, empty)| *platform != self.platform && !empty)
        .map(|(platform, _)| platform)
        .collect()
    }
}
