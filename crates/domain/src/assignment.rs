use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope value addressing the whole resource hierarchy.
///
/// Grants at this scope are never attributed to a single environment.
pub const ROOT_SCOPE: &str = "/";

/// Placeholder rendered when the provider did not resolve a principal name.
pub const UNRESOLVED_PRINCIPAL: &str = "(principal name unavailable)";

/// A role grant binding a principal to a role at a scope, observed live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Globally unique assignment identifier issued by the provider.
    ///
    /// Identifiers compare case-insensitively; use [`RoleAssignment::key`]
    /// for equality checks.
    pub assignment_id: String,
    /// Identifier of the principal the role is granted to.
    pub principal_id: String,
    /// Human-readable principal label, when the provider resolved one.
    pub principal_display_name: Option<String>,
    /// Human-readable role name, when known.
    pub role_name: Option<String>,
    /// Provider-internal role definition identifier, when known.
    pub role_definition_id: Option<String>,
    /// Resource-hierarchy path the grant applies to.
    pub scope: String,
    /// Attribute-based access condition attached to the grant.
    pub condition: Option<String>,
    /// Schema version of `condition`.
    pub condition_version: Option<String>,
    /// Expiry timestamp for time-bounded assignments.
    pub expiry: Option<DateTime<Utc>>,
}

impl RoleAssignment {
    /// Returns the case-folded identity key used for all comparisons.
    #[must_use]
    pub fn key(&self) -> String {
        self.assignment_id.to_lowercase()
    }

    /// Returns the principal label, with an explicit placeholder when the
    /// provider did not resolve one.
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.principal_display_name
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(UNRESOLVED_PRINCIPAL)
    }

    /// Returns whether the grant applies within the environment identified
    /// by `environment_id`. Root-scope grants never match.
    #[must_use]
    pub fn applies_to_environment(&self, environment_id: &str) -> bool {
        self.scope != ROOT_SCOPE
            && self
                .scope
                .to_lowercase()
                .contains(environment_id.to_lowercase().as_str())
    }

    /// Returns whether the assignment carries a resolvable role identity
    /// and is therefore usable as IaC import input.
    #[must_use]
    pub fn has_role_reference(&self) -> bool {
        let resolvable =
            |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());

        resolvable(&self.role_name) || resolvable(&self.role_definition_id)
    }
}

/// The IaC-side counterpart of a role assignment.
///
/// IaC state tracks only the condition attributes; other fields cannot
/// drift on their axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedAssignment {
    /// Access condition recorded in IaC state.
    pub condition: Option<String>,
    /// Condition schema version recorded in IaC state.
    pub condition_version: Option<String>,
}

/// A scheduled (time-bounded) assignment instance reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledInstance {
    /// Identifier of the role assignment the schedule originates from.
    pub origin_assignment_id: String,
    /// End of the elevation window; absent for permanent entries.
    pub end_time: Option<DateTime<Utc>>,
}

/// Keeps only assignments whose scope falls within the environment.
#[must_use]
pub fn filter_to_environment(
    assignments: Vec<RoleAssignment>,
    environment_id: &str,
) -> Vec<RoleAssignment> {
    assignments
        .into_iter()
        .filter(|assignment| assignment.applies_to_environment(environment_id))
        .collect()
}

/// Removes assignments that are active but time-bounded.
///
/// An assignment is ephemeral when a scheduled instance with a non-empty
/// end time names it as origin. Instances without an end time do not
/// exclude anything.
#[must_use]
pub fn exclude_scheduled(
    live: Vec<RoleAssignment>,
    scheduled: &[ScheduledInstance],
) -> Vec<RoleAssignment> {
    let ephemeral: HashSet<String> = scheduled
        .iter()
        .filter(|instance| instance.end_time.is_some())
        .map(|instance| instance.origin_assignment_id.to_lowercase())
        .collect();

    live.into_iter()
        .filter(|assignment| !ephemeral.contains(assignment.key().as_str()))
        .collect()
}
