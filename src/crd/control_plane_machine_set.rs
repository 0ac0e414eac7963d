//! ControlPlaneMachineSet Custom Resource Definition
//!
//! A ControlPlaneMachineSet describes the desired control plane fleet: how many
//! indices it has, the machine template every index is built from and the
//! failure domains the indices are spread across.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::core::SelectorExt;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::machine::MachineSpec;
use super::types::{
    preserve_unknown_fields, Condition, MachineSetState, MachineType, PlatformType,
    RolloutStrategy,
};
use crate::labels::{label_selector, CLUSTER_ID_LABEL, MACHINE_ROLE_LABEL, MACHINE_TYPE_LABEL};
use crate::providerconfig::{FailureDomains, ProviderConfig};

/// Structured validation error for `ControlPlaneMachineSetSpec`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecValidationError {
    pub field: String,
    pub message: String,
    pub how_to_fix: String,
}

impl SpecValidationError {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        how_to_fix: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            how_to_fix: how_to_fix.into(),
        }
    }
}

/// The ControlPlaneMachineSet CRD
///
/// # Example
///
/// ```yaml
/// apiVersion: machine.openshift.io/v1
/// kind: ControlPlaneMachineSet
/// metadata:
///   name: cluster
///   namespace: openshift-machine-api
/// spec:
///   replicas: 3
///   state: Active
///   strategy:
///     type: RollingUpdate
///   selector:
///     matchLabels:
///       machine.openshift.io/cluster-api-cluster: cluster-x7k2p
///       machine.openshift.io/cluster-api-machine-role: master
///       machine.openshift.io/cluster-api-machine-type: master
///   template:
///     machineType: machines_v1beta1_machine_openshift_io
///     machines_v1beta1_machine_openshift_io:
///       failureDomains:
///         platform: AWS
///         aws:
///           - placement:
///               availabilityZone: us-east-1a
///       metadata:
///         labels:
///           machine.openshift.io/cluster-api-cluster: cluster-x7k2p
///           machine.openshift.io/cluster-api-machine-role: master
///           machine.openshift.io/cluster-api-machine-type: master
///       spec:
///         providerSpec:
///           value:
///             kind: AWSMachineProviderConfig
///             instanceType: m6i.xlarge
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "machine.openshift.io",
    version = "v1",
    kind = "ControlPlaneMachineSet",
    namespaced,
    status = "ControlPlaneMachineSetStatus",
    shortname = "cpms",
    printcolumn = r#"{"name":"Desired","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Current","type":"integer","jsonPath":".status.replicas"}"#,
    printcolumn = r#"{"name":"Ready","type":"integer","jsonPath":".status.readyReplicas"}"#,
    printcolumn = r#"{"name":"Updated","type":"integer","jsonPath":".status.updatedReplicas"}"#,
    printcolumn = r#"{"name":"Unavailable","type":"integer","jsonPath":".status.unavailableReplicas"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".spec.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneMachineSetSpec {
    /// Whether the operator acts on the control plane or only reports on it
    #[serde(default)]
    pub state: MachineSetState,

    /// Number of control plane indices
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    #[serde(default)]
    pub strategy: RolloutStrategy,

    /// Selects the machines owned by this set
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub selector: LabelSelector,

    pub template: ControlPlaneMachineSetTemplate,
}

fn default_replicas() -> i32 {
    3
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneMachineSetTemplate {
    #[serde(default)]
    pub machine_type: MachineType,

    #[serde(
        rename = "machines_v1beta1_machine_openshift_io",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub machine: Option<OpenShiftMachineV1Beta1MachineTemplate>,
}

/// Template for machines of the `machine.openshift.io/v1beta1` API
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenShiftMachineV1Beta1MachineTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_domains: Option<FailureDomains>,

    #[serde(default)]
    pub metadata: ControlPlaneMachineSetTemplateObjectMeta,

    #[serde(default)]
    pub spec: MachineSpec,
}

/// Labels and annotations copied onto every machine created from the template
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ControlPlaneMachineSetTemplateObjectMeta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Observed state of the control plane
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneMachineSetStatus {
    /// Available, Degraded, Progressing and Failing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Indices with at least one machine
    #[serde(default)]
    pub replicas: i32,

    /// Indices with at least one ready machine
    #[serde(default)]
    pub ready_replicas: i32,

    /// Indices with at least one ready machine that needs no update
    #[serde(default)]
    pub updated_replicas: i32,

    /// Desired indices without a ready machine
    #[serde(default)]
    pub unavailable_replicas: i32,
}

impl ControlPlaneMachineSetSpec {
    /// Validate the spec, collecting every violation.
    pub fn validate(&self) -> Result<(), Vec<SpecValidationError>> {
        let mut errors: Vec<SpecValidationError> = Vec::new();

        if self.replicas != 3 && self.replicas != 5 {
            errors.push(SpecValidationError::new(
                "spec.replicas",
                format!("replicas must be 3 or 5, got {}", self.replicas),
                "Set spec.replicas to 3 or 5; a control plane needs an odd member count for etcd quorum.",
            ));
        }

        let Some(template) = &self.template.machine else {
            errors.push(SpecValidationError::new(
                "spec.template.machines_v1beta1_machine_openshift_io",
                "machine template is required",
                "Add a spec.template.machines_v1beta1_machine_openshift_io section describing the control plane machines.",
            ));
            return Err(errors);
        };

        for label in [CLUSTER_ID_LABEL, MACHINE_ROLE_LABEL, MACHINE_TYPE_LABEL] {
            if !template.metadata.labels.contains_key(label) {
                errors.push(SpecValidationError::new(
                    "spec.template.machines_v1beta1_machine_openshift_io.metadata.labels",
                    format!("template labels must include {}", label),
                    format!("Add the {} label to the template metadata.", label),
                ));
            }
        }

        match label_selector(&self.selector) {
            Ok(selector) if selector.matches(&template.metadata.labels) => {}
            Ok(_) => errors.push(SpecValidationError::new(
                "spec.selector",
                "selector does not match the template labels",
                "Make spec.selector select the labels set in the template metadata, otherwise created machines are not adopted.",
            )),
            Err(e) => errors.push(SpecValidationError::new(
                "spec.selector",
                e.to_string(),
                "Use the In, NotIn, Exists or DoesNotExist operators with values where required.",
            )),
        }

        if template.spec.provider_spec.value.is_none() {
            errors.push(SpecValidationError::new(
                "spec.template.machines_v1beta1_machine_openshift_io.spec.providerSpec.value",
                "provider spec value is required",
                "Set the provider specific machine configuration under spec.providerSpec.value.",
            ));
        }

        if let Some(failure_domains) = &template.failure_domains {
            for platform in failure_domains.foreign_platforms() {
                errors.push(SpecValidationError::new(
                    "spec.template.machines_v1beta1_machine_openshift_io.failureDomains",
                    format!(
                        "failure domains for {} given but platform is {}",
                        platform, failure_domains.platform
                    ),
                    format!(
                        "Remove the {} failure domains or change failureDomains.platform.",
                        platform
                    ),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Platform of the template: the declared failure domain platform, else
    /// the one implied by the provider payload's kind.
    pub fn platform(&self) -> Option<PlatformType> {
        let template = self.template.machine.as_ref()?;
        if let Some(failure_domains) = &template.failure_domains {
            return Some(failure_domains.platform);
        }
        template
            .spec
            .provider_spec
            .value
            .as_ref()
            .and_then(ProviderConfig::detect_platform)
    }
}

impl ControlPlaneMachineSet {
    pub fn is_active(&self) -> bool {
        self.spec.state == MachineSetState::Active
    }
}
