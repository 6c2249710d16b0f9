//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout Tiergate.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `ConfigurationError`: Unknown or incompletely configured environment, bad config file
//! - `PermissionDenied`: Tool not allowed at all (unknown tool names)
//! - `ProductionProtection`: Write-shaped operation blocked by a read-only tier
//! - `InvalidArgument`: Malformed or missing tool arguments
//! - `ConnectionFailed`: Database connection could not be opened or health-checked
//! - `StatementFailed`: Any failure reported by the statement execution layer
//!
//! "Confirmation required" is not a variant: it is a response status,
//! not an error (see [`crate::output::ToolResponse`]).

use thiserror::Error;

/// Main error type for Tiergate operations
#[derive(Error, Debug)]
pub enum GateError {
    /// Target environment missing or incompletely configured
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Tool is not allowed at all
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Write operation blocked by the active environment's read-only tier
    #[error("Production protection: {0}")]
    ProductionProtection(String),

    /// Invalid or missing tool arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Database connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Statement execution layer reported a failure
    #[error("Statement failed: {0}")]
    StatementFailed(String),
}

impl GateError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling by agents.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigurationError(_) => "CONFIGURATION_ERROR",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::ProductionProtection(_) => "PRODUCTION_PROTECTION",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::StatementFailed(_) => "STATEMENT_FAILED",
        }
    }

    /// Get human-readable error message (agent-appropriate, no credentials)
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError(message.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    /// Create a production protection error
    pub fn production_protection(message: impl Into<String>) -> Self {
        Self::ProductionProtection(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a statement failed error
    pub fn statement_failed(message: impl Into<String>) -> Self {
        Self::StatementFailed(message.into())
    }
}

/// Result type alias for Tiergate operations
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(GateError::configuration("test").error_code(), "CONFIGURATION_ERROR");
        assert_eq!(GateError::permission_denied("test").error_code(), "PERMISSION_DENIED");
        assert_eq!(GateError::production_protection("test").error_code(), "PRODUCTION_PROTECTION");
        assert_eq!(GateError::invalid_argument("test").error_code(), "INVALID_ARGUMENT");
        assert_eq!(GateError::connection_failed("test").error_code(), "CONNECTION_FAILED");
        assert_eq!(GateError::statement_failed("test").error_code(), "STATEMENT_FAILED");
    }

    #[test]
    fn test_error_messages() {
        let err = GateError::production_protection("insert_data is blocked on 'production'");
        assert!(err.message().starts_with("Production protection:"));
        assert!(err.message().contains("insert_data"));

        let err = GateError::statement_failed("Table 'app.nope' doesn't exist");
        assert!(err.message().contains("doesn't exist"));
    }
}
