//! Condition management helpers following Kubernetes API conventions

use crate::crd::Condition;

/// Condition types reported on a ControlPlaneMachineSet
pub const CONDITION_TYPE_AVAILABLE: &str = "Available";
pub const CONDITION_TYPE_DEGRADED: &str = "Degraded";
pub const CONDITION_TYPE_PROGRESSING: &str = "Progressing";
pub const CONDITION_TYPE_FAILING: &str = "Failing";

/// Standard condition statuses
pub const CONDITION_STATUS_TRUE: &str = "True";
pub const CONDITION_STATUS_FALSE: &str = "False";

/// Condition reasons
pub const REASON_ALL_REPLICAS_AVAILABLE: &str = "AllReplicasAvailable";
pub const REASON_UNAVAILABLE_REPLICAS: &str = "UnavailableReplicas";
pub const REASON_UNMANAGED_NODES: &str = "UnmanagedNodes";
pub const REASON_AMBIGUOUS_MACHINE_INDEX: &str = "AmbiguousMachineIndex";
pub const REASON_INVALID_PROVIDER_SPEC: &str = "InvalidProviderSpec";
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";
pub const REASON_NEEDS_UPDATE_REPLICAS: &str = "NeedsUpdateReplicas";
pub const REASON_FAILED_MACHINES: &str = "FailedMachines";
pub const REASON_AS_EXPECTED: &str = "AsExpected";

/// Update or add a condition to the conditions list
///
/// The transition time moves to `now` only when the status changes; reason and
/// message are always overwritten.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: &str,
    reason: &str,
    message: &str,
    now: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_) {
        // Update transition time only if status changed
        let should_update_time = existing.status != status;

        existing.status = status.to_string();
        existing.reason = reason.to_string();
        existing.message = message.to_string();

        if should_update_time {
            existing.last_transition_time = now.to_string();
        }
    } else {
        conditions.push(Condition {
            type_: type_.to_string(),
            status: status.to_string(),
            last_transition_time: now.to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
            observed_generation: None,
        });
    }
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Check if a condition is true
pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_)
        .map(|c| c.status == CONDITION_STATUS_TRUE)
        .unwrap_or(false)
}
