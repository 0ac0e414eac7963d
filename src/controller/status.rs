//! Status calculation for ControlPlaneMachineSets
//!
//! Counts are index-centric: an index counts once no matter how many machines
//! occupy it, which matters during a rolling replacement when an index briefly
//! holds both the old and the new machine. The calculator is a pure function
//! of its input; the caller supplies the current time.

use std::collections::{BTreeMap, BTreeSet};

use crate::crd::{Condition, ControlPlaneMachineSetStatus};

use super::conditions::*;
use super::machine_info::{MachineIndex, MachineInfo};

const MANAGED_CONDITION_TYPES: [&str; 4] = [
    CONDITION_TYPE_AVAILABLE,
    CONDITION_TYPE_DEGRADED,
    CONDITION_TYPE_PROGRESSING,
    CONDITION_TYPE_FAILING,
];

/// Replica counts derived from one pass's MachineInfos
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplicaCounts {
    pub replicas: i32,
    pub ready_replicas: i32,
    pub updated_replicas: i32,
    pub unavailable_replicas: i32,
}

/// Everything the calculator needs besides the MachineInfos
#[derive(Clone, Copy, Debug)]
pub struct StatusInput<'a> {
    pub desired_replicas: i32,
    pub generation: Option<i64>,
    pub machine_infos: &'a [MachineInfo],
    /// Validation failures of the set's spec, if any
    pub spec_error: Option<&'a str>,
    /// Why the template's provider config could not be used, if it could not
    pub template_error: Option<&'a str>,
    /// Conditions currently stored on the set
    pub previous_conditions: &'a [Condition],
    /// RFC 3339 timestamp for conditions that change status
    pub now: &'a str,
}

#[derive(Default)]
struct IndexState {
    has_machine: bool,
    has_ready: bool,
    has_updated_ready: bool,
}

/// Count replicas per index.
pub fn count_replicas(desired_replicas: i32, machine_infos: &[MachineInfo]) -> ReplicaCounts {
    let mut indices: BTreeMap<i32, IndexState> = BTreeMap::new();

    for info in machine_infos {
        if info.machine_name.is_none() {
            continue;
        }
        let Some(index) = info.index.index() else {
            continue;
        };
        let state = indices.entry(index).or_default();
        state.has_machine = true;
        state.has_ready |= info.ready;
        state.has_updated_ready |= info.is_updated_and_ready();
    }

    let count = |f: fn(&IndexState) -> bool| indices.values().filter(|s| f(s)).count() as i32;
    let ready_replicas = count(|s| s.has_ready);

    ReplicaCounts {
        replicas: count(|s| s.has_machine),
        ready_replicas,
        updated_replicas: count(|s| s.has_updated_ready),
        unavailable_replicas: (desired_replicas - ready_replicas).max(0),
    }
}

/// Compute the full status for a pass.
///
/// All four condition types are rebuilt from the input. A condition keeps its
/// stored transition time while its status stays the same; condition types
/// not managed here are dropped.
pub fn calculate_status(input: StatusInput<'_>) -> ControlPlaneMachineSetStatus {
    let counts = count_replicas(input.desired_replicas, input.machine_infos);

    // First stored entry of each managed type; duplicates and foreign types go
    let mut seen = BTreeSet::new();
    let mut conditions: Vec<Condition> = input
        .previous_conditions
        .iter()
        .filter(|c| MANAGED_CONDITION_TYPES.contains(&c.type_.as_str()))
        .filter(|c| seen.insert(c.type_.clone()))
        .cloned()
        .collect();

    let (status, reason, message) = available(input.desired_replicas, &counts);
    set_condition(&mut conditions, CONDITION_TYPE_AVAILABLE, status, reason, &message, input.now);

    let (status, reason, message) =
        degraded(input.spec_error, input.template_error, input.machine_infos);
    set_condition(&mut conditions, CONDITION_TYPE_DEGRADED, status, reason, &message, input.now);

    let (status, reason, message) = progressing(input.desired_replicas, &counts);
    set_condition(&mut conditions, CONDITION_TYPE_PROGRESSING, status, reason, &message, input.now);

    let (status, reason, message) = failing(input.machine_infos);
    set_condition(&mut conditions, CONDITION_TYPE_FAILING, status, reason, &message, input.now);

    for condition in &mut conditions {
        condition.observed_generation = input.generation;
    }
    conditions.sort_by(|a, b| a.type_.cmp(&b.type_));

    ControlPlaneMachineSetStatus {
        conditions,
        observed_generation: input.generation,
        replicas: counts.replicas,
        ready_replicas: counts.ready_replicas,
        updated_replicas: counts.updated_replicas,
        unavailable_replicas: counts.unavailable_replicas,
    }
}

/// A status write is needed when the stored status differs from the computed one
pub fn status_needs_update(
    current: Option<&ControlPlaneMachineSetStatus>,
    computed: &ControlPlaneMachineSetStatus,
) -> bool {
    current != Some(computed)
}

type ConditionValue = (&'static str, &'static str, String);

fn available(desired: i32, counts: &ReplicaCounts) -> ConditionValue {
    if counts.unavailable_replicas == 0 {
        (
            CONDITION_STATUS_TRUE,
            REASON_ALL_REPLICAS_AVAILABLE,
            format!("All {} replicas are available", desired),
        )
    } else {
        (
            CONDITION_STATUS_FALSE,
            REASON_UNAVAILABLE_REPLICAS,
            format!(
                "Missing {} available replica(s) of {} desired",
                counts.unavailable_replicas, desired
            ),
        )
    }
}

fn degraded(
    spec_error: Option<&str>,
    template_error: Option<&str>,
    machine_infos: &[MachineInfo],
) -> ConditionValue {
    if let Some(error) = spec_error {
        return (
            CONDITION_STATUS_TRUE,
            REASON_INVALID_SPEC,
            format!("Spec is invalid: {}", error),
        );
    }

    if let Some(error) = template_error {
        return (
            CONDITION_STATUS_TRUE,
            REASON_INVALID_PROVIDER_SPEC,
            format!("Template provider spec is invalid: {}", error),
        );
    }

    let unmanaged: BTreeSet<&str> = machine_infos
        .iter()
        .filter(|info| info.is_unowned_node())
        .map(MachineInfo::display_name)
        .collect();
    if !unmanaged.is_empty() {
        return (
            CONDITION_STATUS_TRUE,
            REASON_UNMANAGED_NODES,
            format!(
                "Found {} control plane node(s) without a machine: {}",
                unmanaged.len(),
                join(&unmanaged)
            ),
        );
    }

    let ambiguous: BTreeSet<&str> = machine_infos
        .iter()
        .filter(|info| info.machine_name.is_some())
        .filter(|info| matches!(info.index, MachineIndex::Ambiguous { .. }))
        .map(MachineInfo::display_name)
        .collect();
    if !ambiguous.is_empty() {
        return (
            CONDITION_STATUS_TRUE,
            REASON_AMBIGUOUS_MACHINE_INDEX,
            format!(
                "Machine name and index label disagree for: {}",
                join(&ambiguous)
            ),
        );
    }

    (CONDITION_STATUS_FALSE, REASON_AS_EXPECTED, String::new())
}

fn progressing(desired: i32, counts: &ReplicaCounts) -> ConditionValue {
    if counts.updated_replicas < desired {
        (
            CONDITION_STATUS_TRUE,
            REASON_NEEDS_UPDATE_REPLICAS,
            format!(
                "Observed {} replica(s) in need of update",
                desired - counts.updated_replicas
            ),
        )
    } else {
        (CONDITION_STATUS_FALSE, REASON_AS_EXPECTED, String::new())
    }
}

fn failing(machine_infos: &[MachineInfo]) -> ConditionValue {
    let failed: BTreeSet<String> = machine_infos
        .iter()
        .filter_map(|info| {
            info.error
                .as_ref()
                .map(|error| format!("{} ({})", info.display_name(), error.reason))
        })
        .collect();
    if failed.is_empty() {
        return (CONDITION_STATUS_FALSE, REASON_AS_EXPECTED, String::new());
    }
    (
        CONDITION_STATUS_TRUE,
        REASON_FAILED_MACHINES,
        format!("Found {} failed machine(s): {}", failed.len(), join(&failed)),
    )
}

fn join<T: AsRef<str>>(names: &BTreeSet<T>) -> String {
    names
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}
