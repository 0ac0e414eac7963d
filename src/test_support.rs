//! Fixture builders shared by the unit tests
//!
//! Provider payloads mirror what an installer writes for a real cluster; the
//! machine, node and set builders produce objects the way the API server would
//! return them.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Node, NodeCondition, NodeStatus, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, Time};
use serde_json::{json, Value};

use crate::crd::{
    ControlPlaneMachineSet, ControlPlaneMachineSetSpec, ControlPlaneMachineSetStatus,
    ControlPlaneMachineSetTemplate, ControlPlaneMachineSetTemplateObjectMeta, Machine,
    MachineSetState, MachineSpec, MachineStatus, MachineType, OpenShiftMachineV1Beta1MachineTemplate,
    ProviderSpec, RolloutStrategy, RolloutStrategyType, MACHINE_PHASE_FAILED,
};
use crate::labels::{
    CLUSTER_ID_LABEL, CONTROL_PLANE_NODE_LABEL, CONTROL_PLANE_ROLE, MACHINE_INDEX_LABEL,
    MACHINE_ROLE_LABEL, MACHINE_TYPE_LABEL,
};
use crate::providerconfig::{FailureDomains, SubnetParam};

pub const TEST_NAMESPACE: &str = "openshift-machine-api";
pub const TEST_CLUSTER_ID: &str = "cluster-x7k2p";

/// Labels every control plane machine of the test cluster carries
pub fn control_plane_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        (CLUSTER_ID_LABEL.to_string(), TEST_CLUSTER_ID.to_string()),
        (MACHINE_ROLE_LABEL.to_string(), CONTROL_PLANE_ROLE.to_string()),
        (MACHINE_TYPE_LABEL.to_string(), CONTROL_PLANE_ROLE.to_string()),
    ])
}

// ============================================================================
// Provider payloads
// ============================================================================

#[derive(Clone, Debug)]
pub struct AwsProviderSpecBuilder {
    availability_zone: String,
    subnet_filter: String,
    instance_type: String,
}

pub fn aws_provider_spec() -> AwsProviderSpecBuilder {
    AwsProviderSpecBuilder {
        availability_zone: "us-east-1a".to_string(),
        subnet_filter: "aws-subnet-12345678".to_string(),
        instance_type: "m6i.xlarge".to_string(),
    }
}

impl AwsProviderSpecBuilder {
    pub fn with_availability_zone(mut self, zone: &str) -> Self {
        self.availability_zone = zone.to_string();
        self
    }

    pub fn with_subnet_filter(mut self, name: &str) -> Self {
        self.subnet_filter = name.to_string();
        self
    }

    pub fn with_instance_type(mut self, instance_type: &str) -> Self {
        self.instance_type = instance_type.to_string();
        self
    }

    pub fn build_raw(&self) -> Value {
        json!({
            "apiVersion": "awsproviderconfig.openshift.io/v1beta1",
            "kind": "AWSMachineProviderConfig",
            "ami": {"id": "aws-ami-12345678"},
            "blockDevices": [{
                "ebs": {
                    "encrypted": true,
                    "iops": 0,
                    "kmsKey": {"arn": ""},
                    "volumeSize": 120,
                    "volumeType": "gp3"
                }
            }],
            "credentialsSecret": {"name": "aws-cloud-credentials"},
            "deviceIndex": 0,
            "iamInstanceProfile": {"id": "aws-iam-instance-profile-12345678"},
            "instanceType": self.instance_type,
            "loadBalancers": [
                {"name": "aws-nlb-int", "type": "network"},
                {"name": "aws-nlb-ext", "type": "network"}
            ],
            "placement": {
                "availabilityZone": self.availability_zone,
                "region": "us-east-1"
            },
            "securityGroups": [{
                "filters": [{"name": "tag:Name", "values": ["aws-security-group-12345678"]}]
            }],
            "subnet": {
                "filters": [{"name": "tag:Name", "values": [self.subnet_filter]}]
            },
            "userDataSecret": {"name": "aws-user-data-12345678"}
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct OpenStackProviderSpecBuilder {
    availability_zone: Option<String>,
    root_volume_zone: Option<String>,
    primary_subnet: Option<String>,
    extra_subnets: Vec<SubnetParam>,
    without_networks: bool,
}

pub fn openstack_provider_spec() -> OpenStackProviderSpecBuilder {
    OpenStackProviderSpecBuilder::default()
}

impl OpenStackProviderSpecBuilder {
    pub fn with_availability_zone(mut self, zone: &str) -> Self {
        self.availability_zone = Some(zone.to_string());
        self
    }

    pub fn with_root_volume_zone(mut self, zone: &str) -> Self {
        self.root_volume_zone = Some(zone.to_string());
        self
    }

    pub fn with_primary_subnet(mut self, uuid: &str) -> Self {
        self.primary_subnet = Some(uuid.to_string());
        self
    }

    /// Add a network holding only `subnet`, after the default nodes network
    pub fn with_network_subnet(mut self, subnet: SubnetParam) -> Self {
        self.extra_subnets.push(subnet);
        self
    }

    pub fn without_networks(mut self) -> Self {
        self.without_networks = true;
        self
    }

    pub fn build_raw(&self) -> Value {
        let mut raw = json!({
            "apiVersion": "openstackproviderconfig.openshift.io/v1alpha1",
            "kind": "OpenstackProviderSpec",
            "cloudName": "openstack",
            "cloudsSecret": {"name": "openstack-cloud-credentials", "namespace": TEST_NAMESPACE},
            "flavor": "ci.m1.xlarge",
            "image": "0bnhphb-b5564-2wmsh-rhcos",
            "securityGroups": [{"name": "0bnhphb-b5564-2wmsh-worker"}],
            "serverGroupName": "0bnhphb-b5564-2wmsh-master",
            "serverMetadata": {
                "Name": "0bnhphb-b5564-2wmsh-master",
                "openshiftClusterID": "0bnhphb-b5564-2wmsh"
            },
            "tags": ["openshiftClusterID=0bnhphb-b5564-2wmsh"],
            "trunk": true,
            "userDataSecret": {"name": "master-user-data"}
        });

        if !self.without_networks {
            let mut networks = vec![json!({
                "subnets": [{
                    "filter": {
                        "name": "0bnhphb-b5564-2wmsh-nodes",
                        "tags": "openshiftClusterID=0bnhphb-b5564-2wmsh"
                    }
                }]
            })];
            for subnet in &self.extra_subnets {
                networks.push(json!({ "subnets": [subnet] }));
            }
            raw["networks"] = Value::Array(networks);
        }
        if let Some(zone) = &self.availability_zone {
            raw["availabilityZone"] = json!(zone);
        }
        if let Some(zone) = &self.root_volume_zone {
            raw["rootVolume"] = json!({
                "availabilityZone": zone,
                "diskSize": 100,
                "sourceUUID": "0bnhphb-b5564-2wmsh-rhcos",
                "volumeType": "tripleo"
            });
        }
        if let Some(uuid) = &self.primary_subnet {
            raw["primarySubnet"] = json!(uuid);
        }
        raw
    }
}

// ============================================================================
// Machines and nodes
// ============================================================================

#[derive(Clone, Debug)]
pub struct MachineBuilder {
    name: String,
    labels: BTreeMap<String, String>,
    provider_spec: Option<Value>,
    node_name: Option<String>,
    failed: Option<(String, String)>,
    deleting: bool,
}

/// A control plane machine named after `index`, using the default AWS payload
pub fn machine(index: i32) -> MachineBuilder {
    MachineBuilder {
        name: format!("{}-master-{}", TEST_CLUSTER_ID, index),
        labels: control_plane_labels(),
        provider_spec: Some(aws_provider_spec().build_raw()),
        node_name: None,
        failed: None,
        deleting: false,
    }
}

impl MachineBuilder {
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_index_label(mut self, index: &str) -> Self {
        self.labels
            .insert(MACHINE_INDEX_LABEL.to_string(), index.to_string());
        self
    }

    pub fn with_provider_spec(mut self, raw: Value) -> Self {
        self.provider_spec = Some(raw);
        self
    }

    pub fn without_provider_spec(mut self) -> Self {
        self.provider_spec = None;
        self
    }

    pub fn with_node(mut self, node_name: &str) -> Self {
        self.node_name = Some(node_name.to_string());
        self
    }

    pub fn failed(mut self, reason: &str, message: &str) -> Self {
        self.failed = Some((reason.to_string(), message.to_string()));
        self
    }

    pub fn deleting(mut self) -> Self {
        self.deleting = true;
        self
    }

    pub fn build(&self) -> Machine {
        let mut machine = Machine::new(
            &self.name,
            MachineSpec {
                provider_spec: ProviderSpec {
                    value: self.provider_spec.clone(),
                },
                provider_id: None,
            },
        );
        machine.metadata.namespace = Some(TEST_NAMESPACE.to_string());
        machine.metadata.labels = Some(self.labels.clone());
        machine.metadata.resource_version = Some("1".to_string());
        if self.deleting {
            machine.metadata.deletion_timestamp =
                Some(Time(chrono::Utc::now()));
        }

        let mut status = MachineStatus {
            phase: Some("Running".to_string()),
            ..Default::default()
        };
        if let Some(node_name) = &self.node_name {
            status.node_ref = Some(ObjectReference {
                kind: Some("Node".to_string()),
                name: Some(node_name.clone()),
                ..Default::default()
            });
        }
        if let Some((reason, message)) = &self.failed {
            status.phase = Some(MACHINE_PHASE_FAILED.to_string());
            status.error_reason = Some(reason.clone());
            status.error_message = Some(message.clone());
        }
        machine.status = Some(status);
        machine
    }
}

/// A control plane node reporting the given readiness
pub fn node(name: &str, ready: bool) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                CONTROL_PLANE_NODE_LABEL.to_string(),
                String::new(),
            )])),
            ..Default::default()
        },
        status: Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

// ============================================================================
// Control plane machine sets
// ============================================================================

#[derive(Clone, Debug)]
pub struct MachineSetBuilder {
    replicas: i32,
    state: MachineSetState,
    strategy: RolloutStrategyType,
    provider_spec: Option<Value>,
    failure_domains: Option<FailureDomains>,
    template_labels: BTreeMap<String, String>,
    generation: i64,
    status: Option<ControlPlaneMachineSetStatus>,
}

/// The `cluster` set of the test cluster on AWS, without failure domains
pub fn machine_set() -> MachineSetBuilder {
    MachineSetBuilder {
        replicas: 3,
        state: MachineSetState::Active,
        strategy: RolloutStrategyType::RollingUpdate,
        provider_spec: Some(aws_provider_spec().build_raw()),
        failure_domains: None,
        template_labels: control_plane_labels(),
        generation: 1,
        status: None,
    }
}

impl MachineSetBuilder {
    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.state = MachineSetState::Inactive;
        self
    }

    pub fn with_strategy(mut self, strategy: RolloutStrategyType) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_provider_spec(mut self, raw: Value) -> Self {
        self.provider_spec = Some(raw);
        self
    }

    pub fn with_failure_domains(mut self, failure_domains: FailureDomains) -> Self {
        self.failure_domains = Some(failure_domains);
        self
    }

    pub fn without_template_label(mut self, label: &str) -> Self {
        self.template_labels.remove(label);
        self
    }

    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_status(mut self, status: ControlPlaneMachineSetStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn build_spec(&self) -> ControlPlaneMachineSetSpec {
        ControlPlaneMachineSetSpec {
            state: self.state,
            replicas: self.replicas,
            strategy: RolloutStrategy {
                type_: self.strategy,
            },
            selector: LabelSelector {
                match_labels: Some(control_plane_labels()),
                match_expressions: None,
            },
            template: ControlPlaneMachineSetTemplate {
                machine_type: MachineType::MachinesV1beta1MachineOpenshiftIo,
                machine: Some(OpenShiftMachineV1Beta1MachineTemplate {
                    failure_domains: self.failure_domains.clone(),
                    metadata: ControlPlaneMachineSetTemplateObjectMeta {
                        labels: self.template_labels.clone(),
                        annotations: BTreeMap::new(),
                    },
                    spec: MachineSpec {
                        provider_spec: ProviderSpec {
                            value: self.provider_spec.clone(),
                        },
                        provider_id: None,
                    },
                }),
            },
        }
    }

    pub fn build(&self) -> ControlPlaneMachineSet {
        let mut set = ControlPlaneMachineSet::new("cluster", self.build_spec());
        set.metadata.namespace = Some(TEST_NAMESPACE.to_string());
        set.metadata.uid = Some("6f1c8f0e-cpms-uid".to_string());
        set.metadata.generation = Some(self.generation);
        set.metadata.resource_version = Some("1".to_string());
        set.status = self.status.clone();
        set
    }
}
