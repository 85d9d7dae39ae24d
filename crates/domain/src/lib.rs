//! Domain model and drift-classification invariants.

#![forbid(unsafe_code)]

mod assignment;
mod drift;
mod import;
mod report;

pub use assignment::{
    ManagedAssignment, ROOT_SCOPE, RoleAssignment, ScheduledInstance, UNRESOLVED_PRINCIPAL,
    exclude_scheduled, filter_to_environment,
};
pub use drift::{DriftKind, DriftRecord, classify};
pub use import::{ImportPlanEntry, build_import_plan};
pub use report::{DriftSummary, EnvironmentDrift};
