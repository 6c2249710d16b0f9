//! Tiergate - Environment-Aware Database Gateway
//!
//! Tiergate sits between an AI agent and a set of database environments (local, staging,
//! production, ...). For every tool call it decides whether the call may run at all,
//! whether it must first be confirmed, and whether its output must be redacted.
//!
//! # Core Principles
//! - One active environment and one live connection at a time
//! - Permission tiers fixed by configuration (`full_access`, `confirm_required`, `read_only`)
//! - Confirmation is per call, never remembered
//! - Production results and schemas have sensitive fields masked
//! - Every outcome is a structured JSON response
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`output`] - JSON response envelopes
//! - [`engine`] - Statement client traits, introspection, MySQL driver
//! - [`statement`] - SQL shape classification and statement building
//! - [`permission`] - Permission tiers and the decision table
//! - [`confirmation`] - Per-call confirmation gate
//! - [`security`] - Sensitive field patterns and the production redaction filter
//! - [`environment`] - Environment registry
//! - [`session`] - Connection lifecycle and environment switching
//! - [`tools`] - Tool catalog and typed tool inputs
//! - [`pipeline`] - The request pipeline ([`Gateway`])
//! - [`config`] - Configuration files
//! - [`mcp`] - JSON-RPC 2.0 stdio tool server

pub mod config;
pub mod confirmation;
pub mod engine;
pub mod environment;
pub mod error;
pub mod mcp;
pub mod output;
pub mod permission;
pub mod pipeline;
pub mod security;
pub mod session;
pub mod statement;
pub mod tools;

// Re-export commonly used types for convenience
pub use config::{ConfigLocation, GatewayConfig, StoredEnvironment};
pub use engine::{
    ColumnInfo, ConnectionParams, Connector, ExecResult, IndexInfo, QueryResult, Row,
    StatementClient, TableComments, TableSummary,
};
pub use environment::{Environment, EnvironmentRegistry, EnvironmentStatus};
pub use error::{GateError, Result};
pub use output::{
    ConfirmationEnvelope, ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope, ToolResponse,
};
pub use permission::{PermissionDecision, PermissionTier};
pub use pipeline::Gateway;
pub use security::{SecurityFilter, SensitiveCategory};
pub use session::{Session, SwitchOutcome};
pub use tools::{ToolCategory, ToolDescriptor, ToolKind, ToolRequest};
