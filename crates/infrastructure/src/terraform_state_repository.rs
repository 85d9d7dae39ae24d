use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rolewatch_application::{EnvironmentTarget, StateRepository};
use rolewatch_core::{AppError, AppResult};
use rolewatch_domain::ManagedAssignment;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Resource type tracking role assignments in Terraform state.
const ROLE_ASSIGNMENT_RESOURCE_TYPE: &str = "azurerm_role_assignment";

/// Resource mode of entries materialized by Terraform itself.
const MANAGED_MODE: &str = "managed";

/// Per-environment locations of Terraform artifacts.
#[derive(Debug, Clone)]
pub struct EnvironmentStateLocation {
    /// Path to the Terraform state document.
    pub state_path: PathBuf,
    /// Path to the prior role-assignment variable file, when one exists.
    pub variable_path: Option<PathBuf>,
}

/// File-backed Terraform state reader implementing the state port.
pub struct TerraformStateRepository {
    locations: HashMap<String, EnvironmentStateLocation>,
}

#[derive(Debug, Deserialize)]
struct StateDocument {
    #[serde(default)]
    resources: Vec<StateResource>,
}

#[derive(Debug, Deserialize)]
struct StateResource {
    #[serde(rename = "type")]
    resource_type: String,
    mode: String,
    #[serde(default)]
    instances: Vec<StateInstance>,
}

#[derive(Debug, Deserialize)]
struct StateInstance {
    attributes: Value,
}

#[derive(Debug, Deserialize)]
struct RoleAssignmentAttributes {
    id: String,
    condition: Option<String>,
    condition_version: Option<String>,
}

impl TerraformStateRepository {
    /// Creates a repository over per-environment artifact locations keyed
    /// by environment name.
    #[must_use]
    pub fn new(locations: HashMap<String, EnvironmentStateLocation>) -> Self {
        Self { locations }
    }

    fn location(&self, target: &EnvironmentTarget) -> AppResult<&EnvironmentStateLocation> {
        self.locations.get(target.name.as_str()).ok_or_else(|| {
            AppError::StateRead(format!(
                "no state location configured for environment '{}'",
                target.name
            ))
        })
    }

    async fn read_file(path: &Path) -> AppResult<String> {
        tokio::fs::read_to_string(path).await.map_err(|error| {
            AppError::StateRead(format!(
                "failed to read '{}': {error}",
                path.display()
            ))
        })
    }
}

#[async_trait]
impl StateRepository for TerraformStateRepository {
    async fn managed_assignments(
        &self,
        target: &EnvironmentTarget,
    ) -> AppResult<HashMap<String, ManagedAssignment>> {
        let location = self.location(target)?;
        let document = Self::read_file(location.state_path.as_path()).await?;
        let managed = parse_managed_assignments(document.as_str())?;

        debug!(
            environment = %target.name,
            managed_count = managed.len(),
            state_path = %location.state_path.display(),
            "loaded managed assignments from state"
        );

        Ok(managed)
    }

    async fn highest_import_index(&self, target: &EnvironmentTarget) -> AppResult<Option<u64>> {
        let location = self.location(target)?;
        let Some(variable_path) = location.variable_path.as_deref() else {
            return Ok(None);
        };

        let document = match tokio::fs::read_to_string(variable_path).await {
            Ok(document) => document,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(AppError::StateRead(format!(
                    "failed to read '{}': {error}",
                    variable_path.display()
                )));
            }
        };

        parse_highest_index(document.as_str())
    }
}

/// Extracts the managed-assignment map from a Terraform state document.
///
/// Only managed-mode resources of the role-assignment type contribute;
/// every instance is keyed by its case-folded id.
fn parse_managed_assignments(document: &str) -> AppResult<HashMap<String, ManagedAssignment>> {
    let state: StateDocument = serde_json::from_str(document)
        .map_err(|error| AppError::StateRead(format!("malformed state document: {error}")))?;

    let mut managed = HashMap::new();
    for resource in state.resources {
        if resource.resource_type != ROLE_ASSIGNMENT_RESOURCE_TYPE || resource.mode != MANAGED_MODE
        {
            continue;
        }

        for instance in resource.instances {
            let attributes: RoleAssignmentAttributes = serde_json::from_value(instance.attributes)
                .map_err(|error| {
                    AppError::StateRead(format!(
                        "malformed role assignment instance in state: {error}"
                    ))
                })?;

            managed.insert(
                attributes.id.to_lowercase(),
                ManagedAssignment {
                    condition: attributes.condition,
                    condition_version: attributes.condition_version,
                },
            );
        }
    }

    Ok(managed)
}

/// Returns the highest integer key of a variable document, `None` when no
/// integer keys exist.
fn parse_highest_index(document: &str) -> AppResult<Option<u64>> {
    let value: Value = serde_json::from_str(document)
        .map_err(|error| AppError::StateRead(format!("malformed variable document: {error}")))?;

    let Value::Object(entries) = value else {
        return Err(AppError::StateRead(
            "variable document is not an object keyed by index".to_owned(),
        ));
    };

    Ok(entries
        .keys()
        .filter_map(|key| key.parse::<u64>().ok())
        .max())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use rolewatch_application::{EnvironmentTarget, StateRepository};
    use rolewatch_core::EnvironmentName;

    use super::{
        EnvironmentStateLocation, TerraformStateRepository, parse_highest_index,
        parse_managed_assignments,
    };

    const STATE_FIXTURE: &str = r#"{
        "version": 4,
        "terraform_version": "1.9.5",
        "resources": [
            {
                "mode": "managed",
                "type": "azurerm_role_assignment",
                "name": "managed",
                "instances": [
                    {
                        "attributes": {
                            "id": "/subscriptions/SUB-1/providers/Microsoft.Authorization/roleAssignments/AAA",
                            "condition": "@Resource[name] StringEquals 'x'",
                            "condition_version": "2.0",
                            "principal_id": "p-1"
                        }
                    }
                ]
            },
            {
                "mode": "data",
                "type": "azurerm_role_assignment",
                "name": "observed",
                "instances": [
                    { "attributes": { "id": "/ignored", "condition": null, "condition_version": null } }
                ]
            },
            {
                "mode": "managed",
                "type": "azurerm_storage_account",
                "name": "other",
                "instances": [
                    { "attributes": { "account_tier": "Standard" } }
                ]
            }
        ]
    }"#;

    #[test]
    fn managed_role_assignments_are_keyed_by_folded_id() {
        let managed = parse_managed_assignments(STATE_FIXTURE);
        assert!(managed.is_ok_and(|managed| {
            managed.len() == 1
                && managed.contains_key(
                    "/subscriptions/sub-1/providers/microsoft.authorization/roleassignments/aaa",
                )
        }));
    }

    #[test]
    fn unrelated_resource_attributes_are_not_parsed() {
        // The storage account instance has no id attribute; it must be
        // skipped, not reported as malformed.
        let managed = parse_managed_assignments(STATE_FIXTURE);
        assert!(managed.is_ok());
    }

    #[test]
    fn malformed_state_is_a_state_read_error() {
        let managed = parse_managed_assignments("{ not json");
        assert!(managed.is_err());
    }

    #[test]
    fn highest_index_spans_non_contiguous_keys() {
        let document = r#"{"0": {}, "7": {}, "3": {}, "label": {}}"#;
        let highest = parse_highest_index(document);
        assert!(highest.is_ok_and(|value| value == Some(7)));
    }

    #[test]
    fn variable_document_without_integer_keys_has_no_index() {
        let highest = parse_highest_index(r#"{"label": {}}"#);
        assert!(highest.is_ok_and(|value| value.is_none()));
    }

    fn target(name: &str) -> EnvironmentTarget {
        let name = match EnvironmentName::new(name) {
            Ok(value) => value,
            Err(error) => panic!("failed to build test environment name: {error}"),
        };

        EnvironmentTarget {
            name,
            environment_id: "sub-1".to_owned(),
        }
    }

    #[tokio::test]
    async fn missing_variable_file_yields_no_index() {
        let repository = TerraformStateRepository::new(HashMap::from([(
            "production".to_owned(),
            EnvironmentStateLocation {
                state_path: PathBuf::from("/nonexistent/terraform.tfstate"),
                variable_path: Some(PathBuf::from("/nonexistent/role-assignments.json")),
            },
        )]));

        let highest = repository.highest_import_index(&target("production")).await;
        assert!(highest.is_ok_and(|value| value.is_none()));
    }

    #[tokio::test]
    async fn missing_state_file_fails_the_environment() {
        let repository = TerraformStateRepository::new(HashMap::from([(
            "production".to_owned(),
            EnvironmentStateLocation {
                state_path: PathBuf::from("/nonexistent/terraform.tfstate"),
                variable_path: None,
            },
        )]));

        let managed = repository.managed_assignments(&target("production")).await;
        assert!(managed.is_err());
    }

    #[tokio::test]
    async fn unconfigured_environment_fails_the_read() {
        let repository = TerraformStateRepository::new(HashMap::new());

        let managed = repository.managed_assignments(&target("production")).await;
        assert!(managed.is_err());
    }
}
