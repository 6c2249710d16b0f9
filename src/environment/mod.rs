//! Environment Registry
//!
//! Named deployment environments (local, staging, production, ...) with their
//! connection parameters and permission tier.
//!
//! The registry is built once at startup and never gains or loses entries. The only
//! mutable state is the id of the active environment, changed exclusively through the
//! session's switch operation. `is_active` is derived from that id whenever an
//! environment is described.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::engine::ConnectionParams;
use crate::error::{GateError, Result};
use crate::permission::PermissionTier;
use crate::security::SecurityFilter;

/// Label of the environment whose data is redacted when none is configured
pub const DEFAULT_PRODUCTION_LABEL: &str = "production";

/// Environment picked at startup when no default is configured
pub const FALLBACK_ENVIRONMENT: &str = "local";

/// A named deployment environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Unique identifier (the name callers switch to)
    pub id: String,
    /// Display label
    pub label: String,
    /// Human-readable description
    pub description: String,
    /// How to reach the database
    pub params: ConnectionParams,
    /// Permission tier, fixed for the lifetime of the process
    pub tier: PermissionTier,
}

impl Environment {
    /// Create an environment labelled with its id and no description
    pub fn new(id: impl Into<String>, params: ConnectionParams, tier: PermissionTier) -> Self {
        let id = id.into();
        Self { label: id.clone(), id, description: String::new(), params, tier }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check that the connection parameters are usable
    ///
    /// # Errors
    /// Returns `ConfigurationError` naming the missing parameters.
    pub fn validate(&self) -> Result<()> {
        let missing = self.params.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GateError::configuration(format!(
                "Environment '{}' is missing connection parameter(s): {}",
                self.id,
                missing.join(", ")
            )))
        }
    }
}

/// Credential-free view of an environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentStatus {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub tier: PermissionTier,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub is_active: bool,
    pub redaction_active: bool,
}

/// Immutable set of environments plus the active id
#[derive(Debug, Clone)]
pub struct EnvironmentRegistry {
    environments: BTreeMap<String, Environment>,
    active: String,
    production_label: String,
}

impl EnvironmentRegistry {
    /// Build the registry and select the initial environment
    ///
    /// The initial environment is `initial` when given, otherwise the one named
    /// `local`, otherwise the only environment when exactly one is configured.
    ///
    /// # Errors
    /// Returns `ConfigurationError` if no environments are given, an id is duplicated,
    /// or the initial environment is missing or has incomplete connection parameters.
    pub fn new(
        environments: impl IntoIterator<Item = Environment>,
        initial: Option<&str>,
        production_label: impl Into<String>,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();
        for env in environments {
            if env.id.trim().is_empty() {
                return Err(GateError::configuration("Environment names must not be empty"));
            }
            if let Some(previous) = map.insert(env.id.clone(), env) {
                return Err(GateError::configuration(format!(
                    "Environment '{}' is defined more than once",
                    previous.id
                )));
            }
        }

        if map.is_empty() {
            return Err(GateError::configuration("No environments configured"));
        }

        let active = match initial {
            Some(name) => name.to_string(),
            None if map.contains_key(FALLBACK_ENVIRONMENT) => FALLBACK_ENVIRONMENT.to_string(),
            None if map.len() == 1 => map.keys().next().cloned().unwrap_or_default(),
            None => {
                return Err(GateError::configuration(format!(
                    "No default environment configured and no '{FALLBACK_ENVIRONMENT}' environment exists"
                )))
            }
        };

        let registry = Self { environments: map, active, production_label: production_label.into() };
        registry.validate_target(&registry.active)?;
        Ok(registry)
    }

    /// The active environment
    #[must_use]
    pub fn get_active(&self) -> &Environment {
        // `active` always names an entry: it is only set after `validate_target`
        &self.environments[&self.active]
    }

    /// Id of the active environment
    #[must_use]
    pub fn active_id(&self) -> &str {
        &self.active
    }

    /// Look up an environment by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Environment> {
        self.environments.get(id)
    }

    /// Label of the environment whose data is redacted
    #[must_use]
    pub fn production_label(&self) -> &str {
        &self.production_label
    }

    /// Number of configured environments
    #[must_use]
    pub fn len(&self) -> usize {
        self.environments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    /// Check that `id` names a usable environment without changing anything
    ///
    /// # Errors
    /// Returns `ConfigurationError` for unknown ids or incomplete connection parameters.
    pub fn validate_target(&self, id: &str) -> Result<&Environment> {
        let env = self.get(id).ok_or_else(|| {
            let known: Vec<&str> = self.environments.keys().map(String::as_str).collect();
            GateError::configuration(format!(
                "Unknown environment '{id}'. Configured environments: {}",
                known.join(", ")
            ))
        })?;
        env.validate()?;
        Ok(env)
    }

    /// Make `id` the active environment
    ///
    /// Only the session calls this, after the new connection is healthy.
    pub(crate) fn activate(&mut self, id: &str) -> Result<&Environment> {
        self.validate_target(id)?;
        self.active = id.to_string();
        Ok(self.get_active())
    }

    /// Redaction filter for the active environment
    #[must_use]
    pub fn security_filter(&self) -> SecurityFilter {
        SecurityFilter::new(self.active.clone(), &self.production_label)
    }

    /// Credential-free description of one environment
    #[must_use]
    pub fn describe(&self, id: &str) -> Option<EnvironmentStatus> {
        self.get(id).map(|env| EnvironmentStatus {
            id: env.id.clone(),
            label: env.label.clone(),
            description: env.description.clone(),
            tier: env.tier,
            host: env.params.host.clone(),
            port: env.params.port,
            database: env.params.database.clone(),
            is_active: env.id == self.active,
            redaction_active: env.id == self.production_label,
        })
    }

    /// Every environment, sorted by id
    #[must_use]
    pub fn list(&self) -> Vec<EnvironmentStatus> {
        self.environments.keys().filter_map(|id| self.describe(id)).collect()
    }
}
