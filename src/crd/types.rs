//! Shared types for the machine set CRDs

use std::fmt;

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cloud platform a provider payload or failure domain belongs to
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum PlatformType {
    #[serde(rename = "AWS")]
    Aws,
    #[serde(rename = "Azure")]
    Azure,
    #[serde(rename = "GCP")]
    Gcp,
    #[serde(rename = "OpenStack")]
    OpenStack,
    #[serde(rename = "VSphere")]
    VSphere,
    #[serde(rename = "Nutanix")]
    Nutanix,
}

impl PlatformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Aws => "AWS",
            PlatformType::Azure => "Azure",
            PlatformType::Gcp => "GCP",
            PlatformType::OpenStack => "OpenStack",
            PlatformType::VSphere => "VSphere",
            PlatformType::Nutanix => "Nutanix",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the operator acts on the set or only reports its status
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum MachineSetState {
    #[default]
    Active,
    Inactive,
}

/// How outdated control plane machines are replaced
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum RolloutStrategyType {
    /// The operator replaces one index at a time, keeping quorum
    #[default]
    RollingUpdate,
    /// Outdated machines are only replaced after a user deletes them
    OnDelete,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RolloutStrategy {
    #[serde(rename = "type", default)]
    pub type_: RolloutStrategyType,
}

/// Machine API flavour the template is written for
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum MachineType {
    #[default]
    #[serde(rename = "machines_v1beta1_machine_openshift_io")]
    MachinesV1beta1MachineOpenshiftIo,
}

/// Kubernetes-style status condition
///
/// Reports one observation about the ControlPlaneMachineSet.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., "Available", "Degraded", "Progressing", "Failing")
    #[serde(rename = "type")]
    pub type_: String,
    /// Status of the condition: "True", "False", or "Unknown"
    pub status: String,
    /// Last time the condition transitioned
    pub last_transition_time: String,
    /// Machine-readable reason for the condition
    pub reason: String,
    /// Human-readable message
    pub message: String,
    /// The .metadata.generation the condition was computed from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Schema for opaque payloads and embedded upstream types
pub(crate) fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_type_uses_openshift_names() {
        let json = serde_json::to_string(&PlatformType::Aws).unwrap();
        assert_eq!(json, "\"AWS\"");
        let parsed: PlatformType = serde_json::from_str("\"OpenStack\"").unwrap();
        assert_eq!(parsed, PlatformType::OpenStack);
        assert_eq!(PlatformType::VSphere.to_string(), "VSphere");
    }

    #[test]
    fn test_strategy_defaults_to_rolling_update() {
        let strategy: RolloutStrategy = serde_json::from_str("{}").unwrap();
        assert_eq!(strategy.type_, RolloutStrategyType::RollingUpdate);
    }
}
