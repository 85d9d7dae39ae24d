use rolewatch_core::EnvironmentName;
use serde::{Deserialize, Serialize};

use crate::drift::DriftRecord;

/// Drift records grouped for one environment, in classifier emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDrift {
    /// Environment the group belongs to.
    pub environment: EnvironmentName,
    /// Classified records in emission order.
    pub records: Vec<DriftRecord>,
}

/// Cross-environment drift totals, grouped deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftSummary {
    environments: Vec<EnvironmentDrift>,
    total: usize,
}

impl DriftSummary {
    /// Folds ordered per-environment drift groups into one summary.
    ///
    /// Groups keep their fold order and records keep their emission order;
    /// nothing is deduplicated or re-sorted.
    #[must_use]
    pub fn from_groups(groups: Vec<(EnvironmentName, Vec<DriftRecord>)>) -> Self {
        let mut environments = Vec::with_capacity(groups.len());
        let mut total = 0;

        for (environment, records) in groups {
            total += records.len();
            environments.push(EnvironmentDrift {
                environment,
                records,
            });
        }

        Self {
            environments,
            total,
        }
    }

    /// Returns the grouped records in fold order.
    #[must_use]
    pub fn environments(&self) -> &[EnvironmentDrift] {
        self.environments.as_slice()
    }

    /// Returns the total record count across all environments.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns whether any divergence was recorded.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.total > 0
    }
}

#[cfg(test)]
mod tests {
    use rolewatch_core::EnvironmentName;

    use super::DriftSummary;
    use crate::assignment::RoleAssignment;
    use crate::drift::{DriftKind, DriftRecord};

    fn environment(name: &str) -> EnvironmentName {
        match EnvironmentName::new(name) {
            Ok(value) => value,
            Err(error) => panic!("failed to build test environment name: {error}"),
        }
    }

    fn record(env: &EnvironmentName, id: &str) -> DriftRecord {
        DriftRecord {
            environment: env.clone(),
            assignment: RoleAssignment {
                assignment_id: id.to_owned(),
                principal_id: "p-1".to_owned(),
                principal_display_name: None,
                role_name: Some("Reader".to_owned()),
                role_definition_id: None,
                scope: "/subscriptions/sub-1".to_owned(),
                condition: None,
                condition_version: None,
                expiry: None,
            },
            kind: DriftKind::Missing,
        }
    }

    #[test]
    fn summary_counts_across_groups_and_keeps_order() {
        let production = environment("production");
        let staging = environment("staging");
        let groups = vec![
            (
                production.clone(),
                vec![record(&production, "a1"), record(&production, "a2")],
            ),
            (staging.clone(), vec![record(&staging, "b1")]),
        ];

        let summary = DriftSummary::from_groups(groups);
        assert_eq!(summary.total(), 3);
        assert!(summary.has_drift());
        assert_eq!(summary.environments().len(), 2);
        assert_eq!(summary.environments()[0].environment, production);
        assert_eq!(
            summary.environments()[0].records[1].assignment.assignment_id,
            "a2"
        );
    }

    #[test]
    fn empty_groups_report_no_drift() {
        let summary = DriftSummary::from_groups(vec![(environment("production"), Vec::new())]);
        assert_eq!(summary.total(), 0);
        assert!(!summary.has_drift());
    }
}
