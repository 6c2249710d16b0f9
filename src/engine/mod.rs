//! Statement Layer Traits and Core Types
//!
//! This module defines the seam between the gateway and whatever actually runs SQL.
//! The gateway never talks to a driver directly: it asks a [`Connector`] for a
//! [`StatementClient`] bound to one environment's [`ConnectionParams`] and keeps that
//! client for as long as the environment stays active.
//!
//! # Engine Isolation
//! Driver code lives in its own submodule (`mysql`) and shares nothing with the
//! gateway except the types defined here.

use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::Result;

pub mod introspect;

// MySQL engine
#[cfg(feature = "mysql")]
pub mod mysql;

/// Default MySQL port, used when an environment does not configure one
pub const DEFAULT_PORT: u16 = 3306;

/// A single result row (column name to JSON value)
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Connection parameters for one environment
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Hostname or IP address
    pub host: String,

    /// Port number
    pub port: u16,

    /// Username
    pub user: String,

    /// Password
    /// WARNING: Sensitive data, never serialized, logged, or included in error messages
    #[serde(skip_serializing, default)]
    pub password: String,

    /// Default schema selected right after connecting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl ConnectionParams {
    /// Create connection parameters
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        database: Option<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            database,
        }
    }

    /// Names of the required parameters that are empty
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("host");
        }
        if self.user.trim().is_empty() {
            missing.push("user");
        }
        missing
    }

    /// An environment is only usable when host and user are both present
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Outcome of a statement that does not return rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    /// Number of rows affected
    pub rows_affected: u64,

    /// Identifier generated by the statement (AUTO_INCREMENT), if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<u64>,
}

/// Outcome of a statement that returns rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result order
    pub columns: Vec<String>,

    /// Result rows
    pub rows: Vec<Row>,
}

/// Summary of a table in the current database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    /// Table name
    pub name: String,

    /// `BASE TABLE`, `VIEW`, ...
    #[serde(rename = "type")]
    pub table_type: String,

    /// Table comment (omitted when empty)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Column information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,

    /// Declared column type (replaced by a sentinel for sensitive columns in production)
    pub data_type: String,

    /// Whether column allows NULL values
    pub nullable: bool,

    /// Default value (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Key participation (`PRI`, `UNI`, `MUL`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Extra attributes (`auto_increment`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,

    /// Column comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Set by the security filter when the column holds sensitive data
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

impl ColumnInfo {
    /// Create a column with only the essential fields set
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default: None,
            key: None,
            extra: None,
            comment: None,
            sensitive: false,
        }
    }
}

/// Index information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name
    pub name: String,

    /// Column names included in the index, in index order
    pub columns: Vec<String>,

    /// Whether this is a unique index
    pub unique: bool,

    /// Index type (`BTREE`, `FULLTEXT`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_type: Option<String>,
}

/// Comment of a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnComment {
    /// Column name
    pub name: String,

    /// Column comment (empty string when unset)
    pub comment: String,
}

/// Table and column comments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableComments {
    /// Table name
    pub table: String,

    /// Table comment (empty string when unset)
    pub comment: String,

    /// Per-column comments in ordinal order
    pub columns: Vec<ColumnComment>,
}

/// Opens statement clients for an environment
///
/// Implementations hold no per-environment state; the gateway owns the returned client.
pub trait Connector: Send + Sync {
    /// Client type produced by this connector
    type Client: StatementClient;

    /// Open a new connection using the provided parameters
    fn connect(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<Self::Client>> + Send;
}

/// A live connection able to run parameterized SQL
///
/// Positional parameters are bound with `?` placeholders. When `params` is empty the
/// statement is sent as plain text, which keeps statements such as `USE` and `SHOW`
/// usable.
pub trait StatementClient: Send {
    /// Health-check the connection
    fn ping(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Execute a statement that does not return rows
    fn execute(
        &mut self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> impl Future<Output = Result<ExecResult>> + Send;

    /// Execute a statement that returns rows
    fn query(
        &mut self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> impl Future<Output = Result<QueryResult>> + Send;

    /// Close the connection
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}
