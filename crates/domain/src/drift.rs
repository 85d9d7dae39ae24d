use std::collections::{HashMap, HashSet};

use rolewatch_core::EnvironmentName;
use serde::{Deserialize, Serialize};

use crate::assignment::{ManagedAssignment, RoleAssignment};

/// Kind of divergence between a live assignment and IaC-managed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    /// The live assignment is not tracked by IaC state at all.
    Missing,
    /// The live assignment is tracked, but its access condition diverges.
    ConditionMismatch,
}

impl DriftKind {
    /// Returns a stable report value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::ConditionMismatch => "condition_mismatch",
        }
    }
}

/// One classified divergence observed in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftRecord {
    /// Environment the divergence was observed in.
    pub environment: EnvironmentName,
    /// The live assignment that diverges.
    pub assignment: RoleAssignment,
    /// Kind of divergence.
    pub kind: DriftKind,
}

/// Classifies live assignments against the managed-assignment map.
///
/// The managed map is keyed by case-folded assignment id. Emission
/// preserves the input order of `live`; an id appearing more than once in
/// `live` is classified once.
#[must_use]
pub fn classify(
    environment: &EnvironmentName,
    live: &[RoleAssignment],
    managed: &HashMap<String, ManagedAssignment>,
) -> Vec<DriftRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for assignment in live {
        let key = assignment.key();
        if !seen.insert(key.clone()) {
            continue;
        }

        match managed.get(key.as_str()) {
            None => records.push(DriftRecord {
                environment: environment.clone(),
                assignment: assignment.clone(),
                kind: DriftKind::Missing,
            }),
            Some(managed_assignment) => {
                if condition_diverges(assignment, managed_assignment) {
                    records.push(DriftRecord {
                        environment: environment.clone(),
                        assignment: assignment.clone(),
                        kind: DriftKind::ConditionMismatch,
                    });
                }
            }
        }
    }

    records
}

fn condition_diverges(live: &RoleAssignment, managed: &ManagedAssignment) -> bool {
    let live_condition = normalized(live.condition.as_deref());
    let managed_condition = normalized(managed.condition.as_deref());

    if live_condition != managed_condition {
        return true;
    }

    // A version comparison is only meaningful when a condition exists on
    // either side.
    if live_condition.is_empty() && managed_condition.is_empty() {
        return false;
    }

    normalized(live.condition_version.as_deref())
        != normalized(managed.condition_version.as_deref())
}

fn normalized(value: Option<&str>) -> &str {
    value.map(str::trim).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;
    use rolewatch_core::EnvironmentName;

    use super::{DriftKind, classify};
    use crate::assignment::{ManagedAssignment, RoleAssignment};

    fn environment() -> EnvironmentName {
        match EnvironmentName::new("production") {
            Ok(name) => name,
            Err(error) => panic!("failed to build test environment name: {error}"),
        }
    }

    fn assignment(id: &str) -> RoleAssignment {
        RoleAssignment {
            assignment_id: id.to_owned(),
            principal_id: "00000000-0000-0000-0000-000000000001".to_owned(),
            principal_display_name: None,
            role_name: Some("Reader".to_owned()),
            role_definition_id: None,
            scope: "/subscriptions/sub-1".to_owned(),
            condition: None,
            condition_version: None,
            expiry: None,
        }
    }

    fn managed(condition: Option<&str>, version: Option<&str>) -> ManagedAssignment {
        ManagedAssignment {
            condition: condition.map(str::to_owned),
            condition_version: version.map(str::to_owned),
        }
    }

    #[test]
    fn untracked_assignment_is_missing() {
        let live = vec![assignment("A1")];

        let records = classify(&environment(), &live, &HashMap::new());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, DriftKind::Missing);
        assert_eq!(records[0].assignment.assignment_id, "A1");
    }

    #[test]
    fn matching_condition_and_version_is_clean() {
        let mut live_assignment = assignment("A1");
        live_assignment.condition = Some("req.time < '2099-01-01'".to_owned());
        live_assignment.condition_version = Some("2.0".to_owned());

        let managed_map = HashMap::from([(
            "a1".to_owned(),
            managed(Some("req.time < '2099-01-01'"), Some("2.0")),
        )]);

        let records = classify(&environment(), &[live_assignment], &managed_map);
        assert!(records.is_empty());
    }

    #[test]
    fn condition_comparison_ignores_surrounding_whitespace() {
        let mut live_assignment = assignment("A1");
        live_assignment.condition = Some("req.time < '2099-01-01'".to_owned());
        live_assignment.condition_version = Some("2.0".to_owned());

        let managed_map = HashMap::from([(
            "a1".to_owned(),
            managed(Some("req.time < '2099-01-01'  "), Some("2.0")),
        )]);

        let records = classify(&environment(), &[live_assignment], &managed_map);
        assert!(records.is_empty());
    }

    #[test]
    fn differing_condition_is_a_mismatch() {
        let mut live_assignment = assignment("A1");
        live_assignment.condition = Some("req.time < '2099-01-01'".to_owned());

        let managed_map = HashMap::from([("a1".to_owned(), managed(None, None))]);

        let records = classify(&environment(), &[live_assignment], &managed_map);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, DriftKind::ConditionMismatch);
    }

    #[test]
    fn version_difference_alone_is_ignored_without_conditions() {
        let mut live_assignment = assignment("A1");
        live_assignment.condition_version = Some("2.0".to_owned());

        let managed_map = HashMap::from([("a1".to_owned(), managed(None, Some("1.0")))]);

        let records = classify(&environment(), &[live_assignment], &managed_map);
        assert!(records.is_empty());
    }

    #[test]
    fn version_difference_with_condition_present_is_a_mismatch() {
        let mut live_assignment = assignment("A1");
        live_assignment.condition = Some("req.time < '2099-01-01'".to_owned());
        live_assignment.condition_version = Some("2.0".to_owned());

        let managed_map = HashMap::from([(
            "a1".to_owned(),
            managed(Some("req.time < '2099-01-01'"), Some("1.0")),
        )]);

        let records = classify(&environment(), &[live_assignment], &managed_map);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, DriftKind::ConditionMismatch);
    }

    #[test]
    fn duplicate_live_ids_classify_once() {
        let live = vec![assignment("A1"), assignment("a1")];

        let records = classify(&environment(), &live, &HashMap::new());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn emission_preserves_live_order() {
        let live = vec![assignment("B2"), assignment("A1"), assignment("C3")];

        let records = classify(&environment(), &live, &HashMap::new());
        let ids: Vec<&str> = records
            .iter()
            .map(|record| record.assignment.assignment_id.as_str())
            .collect();
        assert_eq!(ids, vec!["B2", "A1", "C3"]);
    }

    proptest! {
        #[test]
        fn classification_is_invariant_under_id_case(id in "[a-zA-Z0-9-]{1,32}") {
            let live_lower = vec![assignment(id.to_lowercase().as_str())];
            let live_upper = vec![assignment(id.to_uppercase().as_str())];
            let managed_map = HashMap::from([(id.to_lowercase(), managed(None, None))]);

            let lower = classify(&environment(), &live_lower, &managed_map);
            let upper = classify(&environment(), &live_upper, &managed_map);
            prop_assert_eq!(lower.len(), upper.len());
        }

        #[test]
        fn classification_is_idempotent(ids in proptest::collection::vec("[a-z0-9-]{1,16}", 0..8)) {
            let live: Vec<_> = ids.iter().map(|id| assignment(id.as_str())).collect();
            let managed_map = HashMap::new();

            let first = classify(&environment(), &live, &managed_map);
            let second = classify(&environment(), &live, &managed_map);
            prop_assert_eq!(first, second);
        }
    }
}
