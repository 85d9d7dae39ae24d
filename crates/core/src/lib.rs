//! Shared primitives for all Rust crates in Rolewatch.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Rolewatch crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated environment name used to key per-environment results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentName(String);

impl EnvironmentName {
    /// Creates a validated environment name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "environment name must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<EnvironmentName> for String {
    fn from(value: EnvironmentName) -> Self {
        value.0
    }
}

impl Display for EnvironmentName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Live provider data could not be read for one environment.
    #[error("provider read error: {0}")]
    ProviderRead(String),

    /// IaC state could not be read or parsed for one environment.
    #[error("state read error: {0}")]
    StateRead(String),

    /// Input records are unusable as IaC import data.
    #[error("data quality error: {0}")]
    DataQuality(String),

    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::EnvironmentName;

    #[test]
    fn environment_name_rejects_whitespace() {
        let result = EnvironmentName::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn environment_name_preserves_value() {
        let result = EnvironmentName::new("production");
        assert!(result.is_ok_and(|name| name.as_str() == "production"));
    }
}
