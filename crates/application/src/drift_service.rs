use std::sync::Arc;

use rolewatch_core::{AppError, AppResult, EnvironmentName};
use rolewatch_domain::{
    DriftRecord, DriftSummary, classify, exclude_scheduled, filter_to_environment,
};
use tracing::{info, warn};

use crate::ports::{AssignmentProvider, EnvironmentTarget, StateRepository};

/// Outcome of one environment's drift pipeline.
#[derive(Debug)]
pub struct EnvironmentOutcome {
    /// Environment the pipeline ran for.
    pub environment: EnvironmentName,
    /// Classified records, or the read error that prevented checking.
    pub result: AppResult<Vec<DriftRecord>>,
}

/// Collected outcomes of one run across all configured environments.
#[derive(Debug)]
pub struct RunReport {
    outcomes: Vec<EnvironmentOutcome>,
}

impl RunReport {
    /// Returns per-environment outcomes in run order.
    #[must_use]
    pub fn outcomes(&self) -> &[EnvironmentOutcome] {
        self.outcomes.as_slice()
    }

    /// Folds the checked environments into a drift summary.
    ///
    /// Failed environments are not represented here; see
    /// [`RunReport::failed_environments`].
    #[must_use]
    pub fn summary(&self) -> DriftSummary {
        let groups = self
            .outcomes
            .iter()
            .filter_map(|outcome| {
                outcome
                    .result
                    .as_ref()
                    .ok()
                    .map(|records| (outcome.environment.clone(), records.clone()))
            })
            .collect();

        DriftSummary::from_groups(groups)
    }

    /// Returns the environments that could not be read, with their errors.
    #[must_use]
    pub fn failed_environments(&self) -> Vec<(&EnvironmentName, &AppError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| {
                outcome
                    .result
                    .as_ref()
                    .err()
                    .map(|error| (&outcome.environment, error))
            })
            .collect()
    }

    /// Returns whether any environment failed to read cleanly.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| outcome.result.is_err())
    }
}

/// Application service running the drift pipeline per environment.
#[derive(Clone)]
pub struct DriftService {
    provider: Arc<dyn AssignmentProvider>,
    state: Arc<dyn StateRepository>,
}

impl DriftService {
    /// Creates a drift service from provider and state port implementations.
    #[must_use]
    pub fn new(provider: Arc<dyn AssignmentProvider>, state: Arc<dyn StateRepository>) -> Self {
        Self { provider, state }
    }

    /// Runs the read, normalize, exclude, classify pipeline for one
    /// environment.
    pub async fn check_environment(
        &self,
        target: &EnvironmentTarget,
    ) -> AppResult<Vec<DriftRecord>> {
        let live = self.provider.list_role_assignments(target).await?;
        let live = filter_to_environment(live, target.environment_id.as_str());

        let scheduled = match self.provider.list_scheduled_instances(target).await {
            Ok(instances) => instances,
            Err(error) => {
                warn!(
                    environment = %target.name,
                    error = %error,
                    "scheduled instance source unavailable, checking the full live set"
                );
                Vec::new()
            }
        };
        let live = exclude_scheduled(live, scheduled.as_slice());

        let managed = self.state.managed_assignments(target).await?;
        let records = classify(&target.name, live.as_slice(), &managed);

        info!(
            environment = %target.name,
            live_count = live.len(),
            managed_count = managed.len(),
            drift_count = records.len(),
            "environment checked"
        );

        Ok(records)
    }

    /// Checks every configured environment, isolating read failures.
    ///
    /// A failing environment is recorded and the run continues with the
    /// remainder.
    pub async fn check_environments(&self, targets: &[EnvironmentTarget]) -> RunReport {
        let mut outcomes = Vec::with_capacity(targets.len());

        for target in targets {
            let result = self.check_environment(target).await;
            if let Err(error) = result.as_ref() {
                warn!(
                    environment = %target.name,
                    error = %error,
                    "environment could not be checked"
                );
            }
            outcomes.push(EnvironmentOutcome {
                environment: target.name.clone(),
                result,
            });
        }

        RunReport { outcomes }
    }
}
