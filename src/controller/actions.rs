//! Corrective machine actions
//!
//! [`plan_actions`] decides from one pass's MachineInfos which machines to
//! create and delete; [`apply_actions`] carries the plan out through a
//! [`ClusterStore`]. Planning is pure so a pass can be inspected or dry-run
//! without touching the cluster.

use std::collections::BTreeMap;

use kube::{Resource, ResourceExt};
use rand::Rng;
use tracing::info;

use crate::crd::{
    ControlPlaneMachineSet, Machine, MachineSpec, OpenShiftMachineV1Beta1MachineTemplate,
    ProviderSpec, RolloutStrategyType,
};
use crate::error::{Error, Result};
use crate::labels::{CLUSTER_ID_LABEL, MACHINE_INDEX_LABEL};
use crate::providerconfig::{FailureDomain, ProviderConfig};

use super::machine_info::MachineInfo;
use super::store::ClusterStore;

#[derive(Clone, Debug, PartialEq)]
pub enum MachineAction {
    /// Create a machine for `index` from `config`
    Create {
        index: i32,
        failure_domain: Option<FailureDomain>,
        config: ProviderConfig,
    },
    /// Delete a machine that has been replaced
    Delete { index: i32, name: String },
}

/// Plan the machine changes that move the fleet towards the template.
///
/// `failure_domains` is the template's list in declared order; index `i` is
/// placed in `failure_domains[i % len]`.
pub fn plan_actions(
    strategy: RolloutStrategyType,
    replicas: i32,
    template: &ProviderConfig,
    failure_domains: &[FailureDomain],
    machine_infos: &[MachineInfo],
) -> Result<Vec<MachineAction>> {
    let mut by_index: BTreeMap<i32, Vec<&MachineInfo>> = BTreeMap::new();
    for info in machine_infos {
        if info.machine_name.is_none() || info.deleting {
            continue;
        }
        if let Some(index) = info.index.index() {
            by_index.entry(index).or_default().push(info);
        }
    }

    let any = |index: i32, f: fn(&MachineInfo) -> bool| {
        by_index
            .get(&index)
            .map(|infos| infos.iter().any(|info| f(info)))
            .unwrap_or(false)
    };
    let has_updated_ready = |index: i32| any(index, MachineInfo::is_updated_and_ready);
    let has_ready = |index: i32| any(index, |info| info.ready);
    // A replacement exists but the machine it replaces is still there
    let in_flight =
        |index: i32| any(index, |info| info.needs_update) && any(index, |info| !info.needs_update);

    let mut actions = Vec::new();

    for index in 0..replicas {
        if !by_index.contains_key(&index) {
            let failure_domain = assigned_failure_domain(failure_domains, index);
            actions.push(create(template, index, failure_domain)?);
        }
    }

    if strategy == RolloutStrategyType::OnDelete {
        return Ok(actions);
    }

    for (index, infos) in &by_index {
        if has_updated_ready(*index) {
            for info in infos.iter().filter(|info| info.needs_update) {
                if let Some(name) = &info.machine_name {
                    actions.push(MachineAction::Delete {
                        index: *index,
                        name: name.clone(),
                    });
                }
            }
        }
    }

    // One replacement at a time, and only while every other index is ready
    let candidate = (0..replicas).find(|index| {
        let outdated = by_index
            .get(index)
            .map(|infos| infos.iter().all(|info| info.needs_update))
            .unwrap_or(false);
        outdated
            && (0..replicas)
                .filter(|other| other != index)
                .all(|other| has_ready(other) && !in_flight(other))
    });

    if let Some(index) = candidate {
        let existing = by_index
            .get(&index)
            .and_then(|infos| infos.iter().find_map(|info| info.failure_domain.clone()))
            .filter(|fd| !fd.is_empty());
        let failure_domain = existing.or_else(|| assigned_failure_domain(failure_domains, index));
        actions.push(create(template, index, failure_domain)?);
    }

    Ok(actions)
}

fn assigned_failure_domain(failure_domains: &[FailureDomain], index: i32) -> Option<FailureDomain> {
    if failure_domains.is_empty() {
        return None;
    }
    let slot = index.rem_euclid(failure_domains.len() as i32) as usize;
    failure_domains.get(slot).cloned()
}

fn create(
    template: &ProviderConfig,
    index: i32,
    failure_domain: Option<FailureDomain>,
) -> Result<MachineAction> {
    let config = match &failure_domain {
        Some(fd) => template.inject_failure_domain(fd)?,
        None => template.clone(),
    };
    Ok(MachineAction::Create {
        index,
        failure_domain,
        config,
    })
}

/// Build the machine a `Create` action asks for.
pub fn machine_for(
    set: &ControlPlaneMachineSet,
    template: &OpenShiftMachineV1Beta1MachineTemplate,
    index: i32,
    config: &ProviderConfig,
) -> Result<Machine> {
    let owner = set.controller_owner_ref(&()).ok_or_else(|| {
        Error::ConfigError(format!("{} has no uid to own machines", set.name_any()))
    })?;

    let mut labels = template.metadata.labels.clone();
    labels.insert(MACHINE_INDEX_LABEL.to_string(), index.to_string());
    let prefix = labels
        .get(CLUSTER_ID_LABEL)
        .cloned()
        .unwrap_or_else(|| set.name_any());

    let mut machine = Machine::new(
        &format!("{}-master-{}-{}", prefix, random_suffix(), index),
        MachineSpec {
            provider_spec: ProviderSpec {
                value: Some(config.raw_config()?),
            },
            provider_id: None,
        },
    );
    machine.metadata.namespace = set.namespace();
    machine.metadata.labels = Some(labels);
    if !template.metadata.annotations.is_empty() {
        machine.metadata.annotations = Some(template.metadata.annotations.clone());
    }
    machine.metadata.owner_references = Some(vec![owner]);
    Ok(machine)
}

fn random_suffix() -> String {
    const CHARS: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
    let mut rng = rand::thread_rng();
    (0..5)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

/// Carry out `actions` against the cluster.
pub async fn apply_actions<S: ClusterStore + ?Sized>(
    store: &S,
    set: &ControlPlaneMachineSet,
    template: &OpenShiftMachineV1Beta1MachineTemplate,
    actions: &[MachineAction],
) -> Result<()> {
    let namespace = set.namespace().unwrap_or_default();

    for action in actions {
        match action {
            MachineAction::Create {
                index,
                failure_domain,
                config,
            } => {
                let machine = machine_for(set, template, *index, config)?;
                match failure_domain {
                    Some(fd) => info!(
                        "Creating machine {} for index {} in {}",
                        machine.name_any(),
                        index,
                        fd
                    ),
                    None => info!("Creating machine {} for index {}", machine.name_any(), index),
                }
                store.create_machine(&machine).await?;
            }
            MachineAction::Delete { index, name } => {
                info!("Deleting outdated machine {} of index {}", name, index);
                store.delete_machine(&namespace, name).await?;
            }
        }
    }
    Ok(())
}
