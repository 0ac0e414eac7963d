//! Controller module for ControlPlaneMachineSet reconciliation
//! This module contains the controller loop, the status calculator and the
//! machine actions that converge the control plane on the template.

pub mod actions;
pub mod conditions;
pub mod machine_info;
mod reconciler;
#[cfg(test)]
mod reconciler_test;
pub mod status;
pub mod store;

pub use actions::{apply_actions, machine_for, plan_actions, MachineAction};
pub use machine_info::{build_machine_infos, MachineError, MachineIndex, MachineInfo};
pub use reconciler::{
    reconcile_pass, requeue_delay, retry_delay, run_controller, ControllerState, PassOptions,
    PassOutcome, MACHINE_SET_NAME,
};
pub use status::{calculate_status, count_replicas, status_needs_update, ReplicaCounts, StatusInput};
pub use store::{ClusterStore, KubeStore, FIELD_MANAGER};
