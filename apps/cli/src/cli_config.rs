use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use rolewatch_application::EnvironmentTarget;
use rolewatch_core::{AppError, AppResult, EnvironmentName};
use rolewatch_infrastructure::{ArmProviderConfig, EnvironmentStateLocation};
use serde::Deserialize;

/// Runtime configuration resolved from the process environment.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// ARM read credentials.
    pub provider: ArmProviderConfig,
    /// Configured reconciliation environments.
    pub environments: Vec<EnvironmentSettings>,
    /// Directory report files are written to, when set.
    pub report_dir: Option<PathBuf>,
}

/// One environment entry from the configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentSettings {
    /// Report name for the environment.
    pub name: String,
    /// Subscription whose scopes belong to the environment.
    pub subscription_id: String,
    /// Path to the Terraform state document.
    pub state_path: PathBuf,
    /// Path to the prior role-assignment variable file.
    #[serde(default)]
    pub variable_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    environments: Vec<EnvironmentSettings>,
}

impl CliConfig {
    /// Loads configuration from the process environment and the
    /// `ROLEWATCH_CONFIG` document.
    pub fn load() -> AppResult<Self> {
        let config_path = required_env("ROLEWATCH_CONFIG")?;
        let document = std::fs::read_to_string(config_path.as_str()).map_err(|error| {
            AppError::Validation(format!(
                "failed to read ROLEWATCH_CONFIG '{config_path}': {error}"
            ))
        })?;
        let document: ConfigDocument =
            serde_json::from_str(document.as_str()).map_err(|error| {
                AppError::Validation(format!(
                    "malformed configuration document '{config_path}': {error}"
                ))
            })?;

        if document.environments.is_empty() {
            return Err(AppError::Validation(
                "configuration lists no environments".to_owned(),
            ));
        }

        let provider = ArmProviderConfig {
            tenant_id: required_env("AZURE_TENANT_ID")?,
            client_id: required_env("AZURE_CLIENT_ID")?,
            client_secret: required_env("AZURE_CLIENT_SECRET")?,
        };

        let report_dir = env::var("ROLEWATCH_REPORT_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            provider,
            environments: document.environments,
            report_dir,
        })
    }

    /// Returns the configured environments as application targets.
    pub fn targets(&self) -> AppResult<Vec<EnvironmentTarget>> {
        self.environments
            .iter()
            .map(|settings| {
                Ok(EnvironmentTarget {
                    name: EnvironmentName::new(settings.name.as_str())?,
                    environment_id: settings.subscription_id.clone(),
                })
            })
            .collect()
    }

    /// Returns per-environment Terraform artifact locations.
    #[must_use]
    pub fn state_locations(&self) -> HashMap<String, EnvironmentStateLocation> {
        self.environments
            .iter()
            .map(|settings| {
                (
                    settings.name.clone(),
                    EnvironmentStateLocation {
                        state_path: settings.state_path.clone(),
                        variable_path: settings.variable_path.clone(),
                    },
                )
            })
            .collect()
    }
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}
