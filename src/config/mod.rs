//! Configuration Management
//!
//! This module loads environment definitions from JSON files.
//!
//! # Configuration Locations
//! - Local: `.tiergate/config.json` (team-shareable, per-project)
//! - Global: `~/.config/tiergate/environments.json` (per-user)
//!
//! # Resolution Precedence
//! 1. Explicit file (`--config` / `TIERGATE_CONFIG`), used alone
//! 2. Local config file (`.tiergate/config.json`)
//! 3. Global config file (`~/.config/tiergate/environments.json`)
//!
//! Local and global files are merged: an environment defined in both is taken from the
//! local file, and a local `default` / `production` overrides the global one.
//!
//! # Format
//! ```json
//! {
//!   "default": "local",
//!   "production": "production",
//!   "environments": {
//!     "local": { "host": "127.0.0.1", "user": "root", "password": "root", "tier": "full_access" },
//!     "production": {
//!       "label": "Production",
//!       "host": "db.internal",
//!       "user": "agent",
//!       "password_env": "PROD_DB_PASSWORD",
//!       "database": "shop",
//!       "tier": "read_only"
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{ConnectionParams, DEFAULT_PORT};
use crate::environment::{Environment, EnvironmentRegistry, DEFAULT_PRODUCTION_LABEL};
use crate::error::{GateError, Result};
use crate::permission::PermissionTier;

/// Contents of one configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Named environments
    #[serde(default)]
    pub environments: BTreeMap<String, StoredEnvironment>,

    /// Environment active at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Name of the environment whose data is redacted (defaults to `production`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Stored environment definition
///
/// Supports an environment variable reference instead of an inline password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoredEnvironment {
    /// Display label (defaults to the environment name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub user: String,

    /// Inline password (prefer `password_env`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Default database selected after connecting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Permission tier (defaults to `read_only`)
    #[serde(default)]
    pub tier: PermissionTier,
}

impl StoredEnvironment {
    /// Resolve environment variables and build the runtime [`Environment`]
    ///
    /// # Errors
    /// Returns `ConfigurationError` if both `password` and `password_env` are set, or
    /// `password_env` names a variable that is not set.
    pub fn resolve(&self, id: &str) -> Result<Environment> {
        let password = match (&self.password, &self.password_env) {
            (Some(_), Some(_)) => {
                return Err(GateError::configuration(format!(
                    "Environment '{id}' sets both password and password_env"
                )));
            }
            (Some(password), None) => password.clone(),
            (None, Some(env_var)) => std::env::var(env_var).map_err(|_| {
                GateError::configuration(format!(
                    "Environment variable {env_var} not found for the password of environment '{id}'"
                ))
            })?,
            (None, None) => String::new(),
        };

        let params = ConnectionParams::new(
            self.host.clone(),
            self.port,
            self.user.clone(),
            password,
            self.database.clone().filter(|db| !db.trim().is_empty()),
        );

        let mut env = Environment::new(id, params, self.tier);
        if let Some(label) = &self.label {
            env = env.with_label(label.clone());
        }
        if let Some(description) = &self.description {
            env = env.with_description(description.clone());
        }
        Ok(env)
    }
}

impl GatewayConfig {
    /// Overlay `overrides` on top of `self`
    #[must_use]
    pub fn merge(mut self, overrides: Self) -> Self {
        self.environments.extend(overrides.environments);
        if overrides.default.is_some() {
            self.default = overrides.default;
        }
        if overrides.production.is_some() {
            self.production = overrides.production;
        }
        self
    }

    /// Label of the environment whose data is redacted
    #[must_use]
    pub fn production_label(&self) -> &str {
        self.production.as_deref().unwrap_or(DEFAULT_PRODUCTION_LABEL)
    }

    /// Resolve every environment and build the registry
    ///
    /// # Errors
    /// Returns `ConfigurationError` for unresolvable environments or when no valid
    /// initial environment can be selected.
    pub fn into_registry(self) -> Result<EnvironmentRegistry> {
        let production = self.production_label().to_string();
        let environments = self
            .environments
            .iter()
            .map(|(id, stored)| stored.resolve(id))
            .collect::<Result<Vec<_>>>()?;

        EnvironmentRegistry::new(environments, self.default.as_deref(), production)
    }
}

/// Configuration file location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Local config: `.tiergate/config.json` (team-shareable)
    Local,
    /// Global config: `~/.config/tiergate/environments.json` (per-user)
    Global,
}

impl ConfigLocation {
    /// Layered locations, lowest precedence first
    pub const LAYERS: [Self; 2] = [Self::Global, Self::Local];

    /// Path of the file for this location
    ///
    /// # Errors
    /// Returns `ConfigurationError` if the directory cannot be determined.
    pub fn path(self) -> Result<PathBuf> {
        match self {
            Self::Local => local_config_path(),
            Self::Global => global_config_path(),
        }
    }
}

/// Get path to local config file (`.tiergate/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        GateError::configuration(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".tiergate").join("config.json"))
}

/// Get path to global config file (`~/.config/tiergate/environments.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| GateError::configuration("Could not determine user config directory"))?;

    Ok(config_dir.join("tiergate").join("environments.json"))
}

/// Load one configuration file, `None` if it does not exist
///
/// # Errors
/// Returns `ConfigurationError` if the file cannot be read or parsed.
pub fn load_file(path: &Path) -> Result<Option<GatewayConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        GateError::configuration(format!("Could not read config file {}: {e}", path.display()))
    })?;

    let config = serde_json::from_str::<GatewayConfig>(&contents).map_err(|e| {
        GateError::configuration(format!("Invalid config file {}: {e}", path.display()))
    })?;

    Ok(Some(config))
}

/// Load the effective configuration
///
/// With an explicit path only that file is read and it must exist. Otherwise the global
/// and local files are merged (local wins).
///
/// # Errors
/// Returns `ConfigurationError` if no configuration file is found or one is invalid.
pub fn load(explicit: Option<&Path>) -> Result<GatewayConfig> {
    if let Some(path) = explicit {
        return load_file(path)?.ok_or_else(|| {
            GateError::configuration(format!("Config file {} does not exist", path.display()))
        });
    }

    let global_path = ConfigLocation::Global.path()?;
    let local_path = ConfigLocation::Local.path()?;
    load_layered(&global_path, &local_path)
}

/// Files contributing to the effective configuration, lowest precedence first
///
/// # Errors
/// Returns `ConfigurationError` if a location's directory cannot be determined.
pub fn sources(explicit: Option<&Path>) -> Result<Vec<PathBuf>> {
    if let Some(path) = explicit {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut found = Vec::new();
    for location in ConfigLocation::LAYERS {
        let path = location.path()?;
        if path.exists() {
            found.push(path);
        }
    }
    Ok(found)
}

/// Merge a global and a local file, local taking precedence
fn load_layered(global_path: &Path, local_path: &Path) -> Result<GatewayConfig> {
    match (load_file(global_path)?, load_file(local_path)?) {
        (Some(global), Some(local)) => Ok(global.merge(local)),
        (Some(config), None) | (None, Some(config)) => Ok(config),
        (None, None) => Err(GateError::configuration(format!(
            "No configuration found. Create {} or {}, or pass --config",
            local_path.display(),
            global_path.display()
        ))),
    }
}
