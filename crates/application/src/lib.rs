//! Application services and ports.

#![forbid(unsafe_code)]

mod bootstrap_service;
mod drift_service;
mod ports;

pub use bootstrap_service::{BootstrapService, ImportPlan};
pub use drift_service::{DriftService, EnvironmentOutcome, RunReport};
pub use ports::{AssignmentProvider, EnvironmentTarget, StateRepository};
