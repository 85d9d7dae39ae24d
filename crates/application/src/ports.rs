use std::collections::HashMap;

use async_trait::async_trait;
use rolewatch_core::{AppResult, EnvironmentName};
use rolewatch_domain::{ManagedAssignment, RoleAssignment, ScheduledInstance};

/// One configured reconciliation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentTarget {
    /// Report name for the environment.
    pub name: EnvironmentName,
    /// Identifier that appears inside scopes belonging to the environment.
    pub environment_id: String,
}

/// Read port for live provider data.
#[async_trait]
pub trait AssignmentProvider: Send + Sync {
    /// Lists role assignments visible to the environment's subscription.
    ///
    /// The returned list is raw provider output; callers apply the
    /// environment scope filter themselves.
    async fn list_role_assignments(
        &self,
        target: &EnvironmentTarget,
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Lists scheduled (time-bounded) assignment instances.
    ///
    /// May fail where the scheduling feature is not enabled; callers treat
    /// that as an empty list, not as a run failure.
    async fn list_scheduled_instances(
        &self,
        target: &EnvironmentTarget,
    ) -> AppResult<Vec<ScheduledInstance>>;
}

/// Read port for IaC-managed assignment state.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Returns managed assignments keyed by case-folded assignment id.
    async fn managed_assignments(
        &self,
        target: &EnvironmentTarget,
    ) -> AppResult<HashMap<String, ManagedAssignment>>;

    /// Returns the highest import index already present in prior variable
    /// data, or `None` when no variable data exists yet.
    async fn highest_import_index(&self, target: &EnvironmentTarget) -> AppResult<Option<u64>>;
}
