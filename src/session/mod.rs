//! Session Manager
//!
//! Owns the single live connection, tied 1:1 to the active environment, together with
//! the registry, the redaction filter built for that environment and the current
//! database selected with `use_database`.
//!
//! # Switching
//! A switch validates the target, opens and pings a connection to it, and only then
//! closes the old connection and moves the active pointer. A failure at any step before
//! that leaves the previous environment, its connection and its filter in place.
//!
//! The connection to the initial environment is opened lazily on first use.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::{Connector, StatementClient};
use crate::environment::{Environment, EnvironmentRegistry, EnvironmentStatus};
use crate::error::{GateError, Result};
use crate::security::SecurityFilter;
use crate::statement::quote_identifier;

/// Result of a successful environment switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchOutcome {
    /// The newly active environment
    pub environment: EnvironmentStatus,
    /// Whether redaction is active, in words
    pub security_status: String,
}

/// Connection state for the active environment
pub struct Session<C: Connector> {
    connector: C,
    registry: EnvironmentRegistry,
    filter: SecurityFilter,
    client: Option<C::Client>,
    current_database: Option<String>,
}

impl<C: Connector> Session<C> {
    /// Create a session on the registry's active environment (not yet connected)
    pub fn new(connector: C, registry: EnvironmentRegistry) -> Self {
        let filter = registry.security_filter();
        let current_database = registry.get_active().params.database.clone();
        Self { connector, registry, filter, client: None, current_database }
    }

    #[must_use]
    pub const fn registry(&self) -> &EnvironmentRegistry {
        &self.registry
    }

    /// The active environment
    #[must_use]
    pub fn active(&self) -> &Environment {
        self.registry.get_active()
    }

    /// Redaction filter of the active environment
    #[must_use]
    pub const fn security_filter(&self) -> &SecurityFilter {
        &self.filter
    }

    /// Database selected for the active connection
    #[must_use]
    pub fn current_database(&self) -> Option<&str> {
        self.current_database.as_deref()
    }

    /// Whether a connection is currently open
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// The live connection, opened on first use
    ///
    /// # Errors
    /// Returns `ConnectionFailed` if the connection cannot be opened or fails its
    /// health check.
    pub async fn client(&mut self) -> Result<&mut C::Client> {
        let client = match self.client.take() {
            Some(client) => client,
            None => open(&self.connector, self.registry.get_active()).await?,
        };
        Ok(self.client.insert(client))
    }

    /// Make `name` the active environment
    ///
    /// # Errors
    /// - `ConfigurationError` if `name` is unknown or its parameters are incomplete
    /// - `ConnectionFailed` if the new connection cannot be opened or pinged
    ///
    /// Either way nothing has changed.
    pub async fn switch_to(&mut self, name: &str) -> Result<SwitchOutcome> {
        let target = self.registry.validate_target(name)?.clone();

        info!(from = self.registry.active_id(), to = name, "Switching environment");

        let new_client = open(&self.connector, &target).await.map_err(|e| {
            warn!(environment = name, error = %e, "Switch aborted, previous environment kept");
            e
        })?;

        if let Some(old_client) = self.client.replace(new_client) {
            if let Err(e) = old_client.close().await {
                warn!(environment = self.registry.active_id(), error = %e, "Failed to close previous connection");
            }
        }

        self.registry.activate(name)?;
        self.filter = self.registry.security_filter();
        self.current_database = target.params.database.clone();

        let environment = self
            .registry
            .describe(name)
            .ok_or_else(|| GateError::configuration(format!("Unknown environment '{name}'")))?;

        info!(
            environment = name,
            tier = %target.tier,
            redaction = self.filter.is_active(),
            "Environment active"
        );

        Ok(SwitchOutcome { environment, security_status: self.filter.status() })
    }

    /// Select the current database on the live connection
    ///
    /// # Errors
    /// Returns `InvalidArgument` for invalid names and any error of the `USE` statement.
    pub async fn use_database(&mut self, database: &str) -> Result<()> {
        if database.contains('.') {
            return Err(GateError::invalid_argument(format!(
                "Invalid database name '{database}'"
            )));
        }
        let quoted = quote_identifier(database)?;

        self.client().await?.execute(&format!("USE {quoted}"), &[]).await?;
        self.current_database = Some(database.to_string());

        debug!(database, "Current database changed");
        Ok(())
    }

    /// Close the live connection, if any
    ///
    /// # Errors
    /// Returns the error reported by the connection's close.
    pub async fn close(&mut self) -> Result<()> {
        match self.client.take() {
            Some(client) => client.close().await,
            None => Ok(()),
        }
    }
}

/// Open and health-check a connection to `env`
async fn open<C: Connector>(connector: &C, env: &Environment) -> Result<C::Client> {
    env.validate()?;

    debug!(environment = %env.id, host = %env.params.host, port = env.params.port, "Connecting");
    let mut client = connector.connect(&env.params).await?;

    if let Err(e) = client.ping().await {
        if let Err(close_err) = client.close().await {
            debug!(error = %close_err, "Failed to close unhealthy connection");
        }
        return Err(e);
    }

    Ok(client)
}
