use std::sync::Arc;

use rolewatch_core::{AppResult, EnvironmentName};
use rolewatch_domain::{ImportPlanEntry, build_import_plan, filter_to_environment};
use tracing::info;

use crate::ports::{AssignmentProvider, EnvironmentTarget, StateRepository};

/// Ordered import mapping for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    /// Environment the plan was built for.
    pub environment: EnvironmentName,
    /// Entries in index order.
    pub entries: Vec<ImportPlanEntry>,
}

/// Application service building IaC import plans from live assignments.
#[derive(Clone)]
pub struct BootstrapService {
    provider: Arc<dyn AssignmentProvider>,
    state: Arc<dyn StateRepository>,
}

impl BootstrapService {
    /// Creates a bootstrap service from provider and state port
    /// implementations.
    #[must_use]
    pub fn new(provider: Arc<dyn AssignmentProvider>, state: Arc<dyn StateRepository>) -> Self {
        Self { provider, state }
    }

    /// Builds the import plan for one environment.
    ///
    /// Live assignments are ordered by folded id before index assignment,
    /// so reruns over unchanged live data produce identical plans.
    pub async fn plan_imports(&self, target: &EnvironmentTarget) -> AppResult<ImportPlan> {
        let live = self.provider.list_role_assignments(target).await?;
        let mut live = filter_to_environment(live, target.environment_id.as_str());
        live.sort_by_key(|assignment| assignment.key());

        let max_index = self.state.highest_import_index(target).await?;
        let entries = build_import_plan(live.as_slice(), max_index)?;

        info!(
            environment = %target.name,
            entry_count = entries.len(),
            continues_after = max_index.map_or(-1_i64, |value| value as i64),
            "import plan built"
        );

        Ok(ImportPlan {
            environment: target.name.clone(),
            entries,
        })
    }
}
