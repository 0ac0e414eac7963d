//! Normalised per-machine observations
//!
//! Each reconciliation pass joins the machines selected by the set with the
//! control plane nodes and turns every pair into a [`MachineInfo`]. Nodes no
//! machine points at become index-less infos of their own so the status
//! calculator can report them.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use tracing::{debug, warn};

use crate::crd::{Machine, PlatformType, MACHINE_PHASE_FAILED};
use crate::labels::MACHINE_INDEX_LABEL;
use crate::providerconfig::{FailureDomain, ProviderConfig};

use super::conditions::REASON_INVALID_PROVIDER_SPEC;

/// Control plane slot a machine claims
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MachineIndex {
    Index(i32),
    /// Nothing to derive an index from
    Unknown,
    /// The name suffix and the index label name different slots
    Ambiguous { name: i32, label: i32 },
}

impl MachineIndex {
    pub fn index(&self) -> Option<i32> {
        match self {
            MachineIndex::Index(index) => Some(*index),
            _ => None,
        }
    }
}

/// Error state reported by or derived for a machine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineError {
    pub reason: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MachineInfo {
    /// `None` for a control plane node without an owning machine
    pub machine_name: Option<String>,
    pub node_name: Option<String>,
    pub index: MachineIndex,
    /// The backing node reports Ready
    pub ready: bool,
    /// The machine's provider config differs from the template placed in the
    /// machine's own failure domain
    pub needs_update: bool,
    /// `None` when the machine's provider config cannot be decoded
    pub failure_domain: Option<FailureDomain>,
    pub error: Option<MachineError>,
    pub deleting: bool,
}

impl MachineInfo {
    pub fn is_unowned_node(&self) -> bool {
        self.machine_name.is_none() && self.node_name.is_some()
    }

    /// Ready and built from the current template
    pub fn is_updated_and_ready(&self) -> bool {
        self.ready && !self.needs_update
    }

    /// Name to report in messages: the machine, else the node
    pub fn display_name(&self) -> &str {
        self.machine_name
            .as_deref()
            .or(self.node_name.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// Index from the trailing `-<n>` of a machine name
pub fn index_from_name(name: &str) -> Option<i32> {
    let (_, suffix) = name.rsplit_once('-')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Derive the slot a machine claims from its name and index label.
pub fn machine_index(machine: &Machine) -> MachineIndex {
    let from_name = index_from_name(&machine.name_any());
    let from_label = machine
        .labels()
        .get(MACHINE_INDEX_LABEL)
        .and_then(|value| value.parse::<i32>().ok())
        .filter(|index| *index >= 0);

    match (from_name, from_label) {
        (Some(name), Some(label)) if name != label => MachineIndex::Ambiguous { name, label },
        (Some(index), _) | (None, Some(index)) => MachineIndex::Index(index),
        (None, None) => MachineIndex::Unknown,
    }
}

/// Whether the node's Ready condition is True
pub fn node_is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

/// Build the MachineInfo list for one pass.
///
/// `platform` is the set's platform when known; machines whose payload cannot
/// be decoded for it get an `InvalidProviderSpec` error. Without a decoded
/// `template` every machine needs an update.
pub fn build_machine_infos(
    platform: Option<PlatformType>,
    template: Option<&ProviderConfig>,
    machines: &[Machine],
    nodes: &[Node],
) -> Vec<MachineInfo> {
    let nodes_by_name: BTreeMap<String, &Node> =
        nodes.iter().map(|node| (node.name_any(), node)).collect();
    let mut owned_nodes = BTreeSet::new();
    let mut infos = Vec::with_capacity(machines.len() + 1);

    for machine in machines {
        let node_name = machine.node_name().map(str::to_string);
        let ready = node_name
            .as_deref()
            .and_then(|name| nodes_by_name.get(name))
            .map(|node| node_is_ready(node))
            .unwrap_or(false);
        if let Some(name) = &node_name {
            owned_nodes.insert(name.clone());
        }

        let index = machine_index(machine);
        if let MachineIndex::Ambiguous { name, label } = index {
            warn!(
                "Machine {} has index {} in its name but {} in its label",
                machine.name_any(),
                name,
                label
            );
        }

        let (failure_domain, needs_update, decode_error) = match decode_machine_config(platform, machine) {
            Ok(config) => {
                let failure_domain = config.extract_failure_domain();
                let needs_update = match template {
                    Some(template) => match template.inject_failure_domain(&failure_domain) {
                        Ok(desired) => desired != config,
                        Err(e) => {
                            debug!("Cannot place template like {}: {}", machine.name_any(), e);
                            true
                        }
                    },
                    None => true,
                };
                (Some(failure_domain), needs_update, None)
            }
            Err(message) => (
                None,
                true,
                Some(MachineError {
                    reason: REASON_INVALID_PROVIDER_SPEC.to_string(),
                    message,
                }),
            ),
        };

        infos.push(MachineInfo {
            machine_name: Some(machine.name_any()),
            node_name,
            index,
            ready,
            needs_update,
            failure_domain,
            error: decode_error.or_else(|| reported_error(machine)),
            deleting: machine.is_deleting(),
        });
    }

    for (name, node) in &nodes_by_name {
        if owned_nodes.contains(name) {
            continue;
        }
        infos.push(MachineInfo {
            machine_name: None,
            node_name: Some(name.clone()),
            index: MachineIndex::Unknown,
            ready: node_is_ready(node),
            needs_update: false,
            failure_domain: None,
            error: None,
            deleting: false,
        });
    }

    infos
}

fn decode_machine_config(
    platform: Option<PlatformType>,
    machine: &Machine,
) -> std::result::Result<ProviderConfig, String> {
    let raw = machine
        .provider_spec_value()
        .ok_or_else(|| "machine has no provider spec".to_string())?;
    let platform = platform
        .or_else(|| ProviderConfig::detect_platform(raw))
        .ok_or_else(|| "cannot determine the platform of the provider spec".to_string())?;
    ProviderConfig::parse(raw, platform).map_err(|e| e.to_string())
}

fn reported_error(machine: &Machine) -> Option<MachineError> {
    let status = machine.status.as_ref()?;
    let failed = status.phase.as_deref() == Some(MACHINE_PHASE_FAILED);
    if !failed && status.error_reason.is_none() && status.error_message.is_none() {
        return None;
    }
    Some(MachineError {
        reason: status
            .error_reason
            .clone()
            .unwrap_or_else(|| MACHINE_PHASE_FAILED.to_string()),
        message: status.error_message.clone().unwrap_or_default(),
    })
}
