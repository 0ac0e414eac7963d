//! Custom Resource Definitions for the control plane machine set operator
//!
//! `ControlPlaneMachineSet` is the resource this operator reconciles;
//! `Machine` is the subset of the machine API it reads and creates.

mod control_plane_machine_set;
mod machine;
pub mod types;


pub use control_plane_machine_set::{
    ControlPlaneMachineSet, ControlPlaneMachineSetSpec, ControlPlaneMachineSetStatus,
    ControlPlaneMachineSetTemplate, ControlPlaneMachineSetTemplateObjectMeta,
    OpenShiftMachineV1Beta1MachineTemplate, SpecValidationError,
};
pub use machine::{Machine, MachineSpec, MachineStatus, ProviderSpec, MACHINE_PHASE_FAILED};
pub use types::*;
