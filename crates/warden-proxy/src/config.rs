//! Configuration (warden.toml)
//!
//! Selects the backend and describes a [`PolicyChecker`]:
//!
//! ```toml
//! backend = "auto"            # auto | portable | accelerated
//!
//! [policy]
//! grants = ["zope.View"]
//! exempt = ["pkg.Value"]
//!
//! [policy.names]
//! "item-get" = "zope.View"
//! "len" = "public"
//! ```

use crate::backend::{self, BackendKind, BackendPreference};
use crate::checker::Permission;
use crate::object::TypeName;
use crate::policy::{Grants, PolicyChecker};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize
    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    /// Parsed but invalid
    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Backend to install
    #[serde(default)]
    pub backend: BackendPreference,

    /// Reference policy
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Policy section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Permissions held by the current principal
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<Permission>,

    /// Type names whose values are returned unmediated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exempt: Vec<String>,

    /// Operation or attribute name to required permission
    #[serde(default)]
    pub names: BTreeMap<String, Permission>,
}

impl Config {
    /// Parse configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, permission) in &self.policy.names {
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "Policy name cannot be empty".to_string(),
                ));
            }
            if permission.as_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Policy name '{}' has empty permission",
                    name
                )));
            }
        }

        for permission in &self.policy.grants {
            if permission.as_str().is_empty() {
                return Err(ConfigError::Validation(
                    "Granted permission cannot be empty".to_string(),
                ));
            }
        }

        for type_name in &self.policy.exempt {
            if type_name.is_empty() || type_name.ends_with('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid exempt type name '{}'",
                    type_name
                )));
            }
        }

        Ok(())
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Write configuration to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Fresh grant set holding the configured grants
    pub fn grants(&self) -> Arc<Grants> {
        Arc::new(Grants::with(self.policy.grants.iter().cloned()))
    }

    /// Build the configured checker over a fresh grant set
    pub fn checker(&self) -> PolicyChecker {
        self.checker_with(self.grants())
    }

    /// Build the configured checker over an existing grant set
    pub fn checker_with(&self, grants: Arc<Grants>) -> PolicyChecker {
        let checker = self
            .policy
            .names
            .iter()
            .fold(PolicyChecker::new(grants), |checker, (name, permission)| {
                checker.protect(name, permission.clone())
            });
        self.policy
            .exempt
            .iter()
            .fold(checker, |checker, type_name| checker.exempt(TypeName::parse(type_name)))
    }

    /// Install the configured backend for this process
    pub fn install_backend(&self) -> BackendKind {
        backend::install(self.backend)
    }
}
