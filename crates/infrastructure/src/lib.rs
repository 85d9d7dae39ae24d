//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod arm_assignment_provider;
mod terraform_state_repository;

pub use arm_assignment_provider::{ArmAssignmentProvider, ArmProviderConfig};
pub use terraform_state_repository::{EnvironmentStateLocation, TerraformStateRepository};
