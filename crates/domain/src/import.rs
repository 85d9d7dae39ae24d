use rolewatch_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::assignment::RoleAssignment;

/// One assignment mapped to a synthetic IaC import index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPlanEntry {
    /// Index the assignment receives in the IaC variable data.
    pub index: u64,
    /// The assignment to bring under management.
    pub assignment: RoleAssignment,
}

/// Assigns import indices to live assignments in input order.
///
/// Indices continue after `max_index` (`None` when no prior variable data
/// exists) with no gaps and no reuse. The generator does not sort; callers
/// wanting a canonical ordering sort `live` first.
///
/// Fails with [`AppError::DataQuality`] when any assignment lacks both a
/// role name and a role definition id, naming every offending assignment.
pub fn build_import_plan(
    live: &[RoleAssignment],
    max_index: Option<u64>,
) -> AppResult<Vec<ImportPlanEntry>> {
    let unusable: Vec<&str> = live
        .iter()
        .filter(|assignment| !assignment.has_role_reference())
        .map(|assignment| assignment.assignment_id.as_str())
        .collect();

    if !unusable.is_empty() {
        return Err(AppError::DataQuality(format!(
            "assignments without a resolvable role name or role definition id: {}",
            unusable.join(", ")
        )));
    }

    let start = max_index.map_or(0, |value| value + 1);

    Ok(live
        .iter()
        .enumerate()
        .map(|(offset, assignment)| ImportPlanEntry {
            index: start + offset as u64,
            assignment: assignment.clone(),
        })
        .collect())
}
