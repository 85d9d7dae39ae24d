use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolewatch_application::{AssignmentProvider, EnvironmentTarget};
use rolewatch_core::{AppError, AppResult};
use rolewatch_domain::{RoleAssignment, ScheduledInstance};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

const MANAGEMENT_BASE: &str = "https://management.azure.com";
const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

const ROLE_ASSIGNMENTS_API_VERSION: &str = "2022-04-01";
const SCHEDULE_INSTANCES_API_VERSION: &str = "2020-10-01";

/// Seconds subtracted from the token lifetime before a refresh is forced.
const TOKEN_EARLY_REFRESH_SECONDS: u64 = 60;

/// Service principal credentials for the ARM read client.
#[derive(Debug, Clone)]
pub struct ArmProviderConfig {
    /// Tenant the service principal authenticates against.
    pub tenant_id: String,
    /// Service principal client id.
    pub client_id: String,
    /// Service principal client secret.
    pub client_secret: String,
}

/// Read-only Azure Resource Manager client implementing the assignment
/// provider port.
pub struct ArmAssignmentProvider {
    http: reqwest::Client,
    config: ArmProviderConfig,
    management_base: Url,
    login_base: Url,
    token_cache: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ArmList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArmRoleAssignment {
    id: String,
    properties: ArmRoleAssignmentProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmRoleAssignmentProperties {
    principal_id: String,
    role_definition_id: Option<String>,
    scope: String,
    condition: Option<String>,
    condition_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArmScheduleInstance {
    properties: ArmScheduleInstanceProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmScheduleInstanceProperties {
    origin_role_assignment_id: Option<String>,
    end_date_time: Option<DateTime<Utc>>,
}

impl ArmAssignmentProvider {
    /// Creates an ARM client from an HTTP client and credentials.
    pub fn new(http: reqwest::Client, config: ArmProviderConfig) -> AppResult<Self> {
        let management_base = Url::parse(MANAGEMENT_BASE)
            .map_err(|error| AppError::Internal(format!("invalid management base url: {error}")))?;
        let login_base = Url::parse(LOGIN_BASE)
            .map_err(|error| AppError::Internal(format!("invalid login base url: {error}")))?;

        Ok(Self {
            http,
            config,
            management_base,
            login_base,
            token_cache: Mutex::new(None),
        })
    }

    async fn token(&self) -> AppResult<String> {
        {
            let cache = self.token_cache.lock().await;
            if let Some(cached) = cache.as_ref() {
                if Instant::now() < cached.expires_at {
                    return Ok(cached.value.clone());
                }
            }
        }

        let endpoint = self
            .login_base
            .join(format!("{}/oauth2/v2.0/token", self.config.tenant_id).as_str())
            .map_err(|error| AppError::Internal(format!("invalid token endpoint: {error}")))?;
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", MANAGEMENT_SCOPE),
        ];

        let response = self
            .http
            .post(endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|error| {
                AppError::ProviderRead(format!("failed to request management token: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ProviderRead(format!(
                "token endpoint returned status {}",
                status.as_u16()
            )));
        }

        let token = response.json::<TokenResponse>().await.map_err(|error| {
            AppError::ProviderRead(format!("failed to decode token response: {error}"))
        })?;

        let lifetime = token
            .expires_in
            .saturating_sub(TOKEN_EARLY_REFRESH_SECONDS);
        *self.token_cache.lock().await = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });

        Ok(token.access_token)
    }

    fn listing_endpoint(
        &self,
        subscription_id: &str,
        collection: &str,
        api_version: &str,
    ) -> AppResult<Url> {
        let mut endpoint = self
            .management_base
            .join(
                format!(
                    "subscriptions/{subscription_id}/providers/Microsoft.Authorization/{collection}"
                )
                .as_str(),
            )
            .map_err(|error| AppError::Internal(format!("invalid listing endpoint: {error}")))?;
        endpoint
            .query_pairs_mut()
            .append_pair("api-version", api_version);

        Ok(endpoint)
    }

    async fn fetch_all_pages<T>(&self, first: Url) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(endpoint) = next {
            let token = self.token().await?;
            let response = self
                .http
                .get(endpoint.clone())
                .bearer_auth(token.as_str())
                .send()
                .await
                .map_err(|error| {
                    AppError::ProviderRead(format!(
                        "failed to call ARM endpoint '{endpoint}': {error}"
                    ))
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<body unavailable>".to_owned());
                return Err(AppError::ProviderRead(format!(
                    "ARM endpoint '{endpoint}' returned status {}: {body}",
                    status.as_u16()
                )));
            }

            let page = response.json::<ArmList<T>>().await.map_err(|error| {
                AppError::ProviderRead(format!(
                    "failed to decode ARM response from '{endpoint}': {error}"
                ))
            })?;

            items.extend(page.value);
            debug!(fetched = items.len(), "fetched ARM listing page");

            next = match page.next_link {
                Some(link) => Some(Url::parse(link.as_str()).map_err(|error| {
                    AppError::ProviderRead(format!(
                        "invalid ARM continuation link '{link}': {error}"
                    ))
                })?),
                None => None,
            };
        }

        Ok(items)
    }
}

#[async_trait]
impl AssignmentProvider for ArmAssignmentProvider {
    async fn list_role_assignments(
        &self,
        target: &EnvironmentTarget,
    ) -> AppResult<Vec<RoleAssignment>> {
        let endpoint = self.listing_endpoint(
            target.environment_id.as_str(),
            "roleAssignments",
            ROLE_ASSIGNMENTS_API_VERSION,
        )?;
        let raw: Vec<ArmRoleAssignment> = self.fetch_all_pages(endpoint).await?;

        Ok(raw.into_iter().map(canonical_assignment).collect())
    }

    async fn list_scheduled_instances(
        &self,
        target: &EnvironmentTarget,
    ) -> AppResult<Vec<ScheduledInstance>> {
        let endpoint = self.listing_endpoint(
            target.environment_id.as_str(),
            "roleAssignmentScheduleInstances",
            SCHEDULE_INSTANCES_API_VERSION,
        )?;
        let raw: Vec<ArmScheduleInstance> = self.fetch_all_pages(endpoint).await?;

        Ok(raw.into_iter().filter_map(canonical_instance).collect())
    }
}

fn canonical_assignment(raw: ArmRoleAssignment) -> RoleAssignment {
    RoleAssignment {
        assignment_id: raw.id,
        principal_id: raw.properties.principal_id,
        // The listing endpoint does not resolve principal or role names;
        // the renderer substitutes placeholders for absent labels.
        principal_display_name: None,
        role_name: None,
        role_definition_id: raw.properties.role_definition_id,
        scope: raw.properties.scope,
        condition: raw.properties.condition,
        condition_version: raw.properties.condition_version,
        expiry: None,
    }
}

fn canonical_instance(raw: ArmScheduleInstance) -> Option<ScheduledInstance> {
    raw.properties
        .origin_role_assignment_id
        .map(|origin| ScheduledInstance {
            origin_assignment_id: origin,
            end_time: raw.properties.end_date_time,
        })
}
