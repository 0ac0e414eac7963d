//! cpms-operator: control plane machine set operator
//!
//! This crate keeps a cluster's control plane machines converged on a single
//! template, spread across the template's failure domains, and reports the
//! observed fleet on the ControlPlaneMachineSet status.

pub mod controller;
pub mod crd;
pub mod error;
pub mod labels;
pub mod providerconfig;

#[cfg(test)]
mod test_support;

pub use crate::error::{Error, Result};
