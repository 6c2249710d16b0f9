//! JSON Output Envelope Types
//!
//! Every tool call produces exactly one [`ToolResponse`], tagged by `status`:
//!
//! - Success: `{"status": "success", "ok": true, "environment": "...", "tool": "...", "data": {...}, "meta": {...}}`
//! - Confirmation: `{"status": "confirmation_required", "ok": false, "environment": "...", "tool": "...", "message": "...", "retry_with": {"confirm": true}}`
//! - Error: `{"status": "error", "ok": false, "environment": "...", "tool": "...", "error": {"code": "...", "message": "..."}}`
//!
//! `ok` is kept alongside `status` so callers that only check one field still work.

use serde::Serialize;

use crate::confirmation::ConfirmationPrompt;
use crate::error::GateError;

/// Structured result of one tool call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResponse {
    Success(SuccessEnvelope),
    ConfirmationRequired(ConfirmationEnvelope),
    Error(ErrorEnvelope),
}

impl ToolResponse {
    /// Whether the tool ran successfully
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether the response reports an error
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The `status` tag as serialized
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::ConfirmationRequired(_) => "confirmation_required",
            Self::Error(_) => "error",
        }
    }

    /// Error code, if this is an error response
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Error(envelope) => Some(&envelope.error.code),
            _ => None,
        }
    }

    /// Serialize to a JSON value
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "status": "error",
                "ok": false,
                "error": { "code": "SERIALIZATION_FAILED", "message": e.to_string() },
            })
        })
    }
}

/// Success envelope for tool results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessEnvelope {
    /// Always true for success envelopes
    pub ok: bool,

    /// Environment active when the tool ran (the new one for `switch_environment`)
    pub environment: String,

    /// Tool that was executed
    pub tool: String,

    /// Tool-specific data
    pub data: serde_json::Value,

    /// Execution metadata
    pub meta: Metadata,
}

impl SuccessEnvelope {
    /// Create a new success envelope
    pub fn new(
        environment: impl Into<String>,
        tool: impl Into<String>,
        data: serde_json::Value,
        meta: Metadata,
    ) -> Self {
        Self { ok: true, environment: environment.into(), tool: tool.into(), data, meta }
    }
}

/// Returned when a call must be re-issued with `confirm: true`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationEnvelope {
    /// Always false: nothing was executed
    pub ok: bool,

    #[serde(flatten)]
    pub prompt: ConfirmationPrompt,
}

impl ConfirmationEnvelope {
    #[must_use]
    pub const fn new(prompt: ConfirmationPrompt) -> Self {
        Self { ok: false, prompt }
    }
}

/// Error envelope for tool failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    /// Environment active when the call was rejected or failed
    pub environment: String,

    /// Tool that was attempted (the raw name for unknown tools)
    pub tool: String,

    /// Error information
    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    /// Create a new error envelope
    pub fn new(environment: impl Into<String>, tool: impl Into<String>, error: ErrorInfo) -> Self {
        Self { ok: false, environment: environment.into(), tool: tool.into(), error }
    }

    /// Create error envelope from GateError
    pub fn from_error(environment: impl Into<String>, tool: impl Into<String>, err: &GateError) -> Self {
        Self::new(environment, tool, ErrorInfo::from(err))
    }
}

/// Error information structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "PRODUCTION_PROTECTION", "CONNECTION_FAILED")
    pub code: String,

    /// Human-readable error message (no credentials)
    pub message: String,
}

impl ErrorInfo {
    /// Create a new error info
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

impl From<&GateError> for ErrorInfo {
    fn from(err: &GateError) -> Self {
        Self::new(err.error_code(), err.message())
    }
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Number of rows returned (for row-returning tools, None for others)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<usize>,

    /// Advisory note attached when production redaction affected the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,

    /// Fields whose values were masked
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub masked_fields: Vec<String>,
}

impl Metadata {
    /// Create new metadata with just execution time
    #[must_use]
    pub fn new(execution_ms: u64) -> Self {
        Self { execution_ms, ..Self::default() }
    }

    /// Create new metadata with execution time and row count
    #[must_use]
    pub fn with_rows(execution_ms: u64, rows_returned: usize) -> Self {
        Self { execution_ms, rows_returned: Some(rows_returned), ..Self::default() }
    }

    #[must_use]
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    #[must_use]
    pub fn with_masked_fields(mut self, masked_fields: Vec<String>) -> Self {
        self.masked_fields = masked_fields;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_serialization() {
        let response = ToolResponse::Success(SuccessEnvelope::new(
            "local",
            "select_query",
            json!({"rows": []}),
            Metadata::with_rows(42, 10),
        ));

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""status":"success""#));
        assert!(json.contains(r#""ok":true"#));
        assert!(json.contains(r#""environment":"local""#));
        assert!(json.contains(r#""tool":"select_query""#));
        assert!(json.contains(r#""execution_ms":42"#));
        assert!(json.contains(r#""rows_returned":10"#));
        assert!(!json.contains("notice"));
        assert!(!json.contains("masked_fields"));
    }

    #[test]
    fn test_error_envelope_from_gate_error() {
        let err = GateError::production_protection("insert_data is not allowed");
        let response = ToolResponse::Error(ErrorEnvelope::from_error("production", "insert_data", &err));

        assert!(response.is_error());
        assert_eq!(response.error_code(), Some("PRODUCTION_PROTECTION"));

        let value = response.to_value();
        assert_eq!(value["status"], "error");
        assert_eq!(value["ok"], false);
        assert_eq!(value["environment"], "production");
        assert!(value["error"]["message"].as_str().unwrap().contains("insert_data"));
    }

    #[test]
    fn test_confirmation_envelope_shape() {
        let response = ToolResponse::ConfirmationRequired(ConfirmationEnvelope::new(ConfirmationPrompt {
            tool: "delete_data".into(),
            environment: "staging".into(),
            message: "confirm it".into(),
            retry_with: json!({"confirm": true}),
        }));

        insta::assert_json_snapshot!(response, @r###"
        {
          "status": "confirmation_required",
          "ok": false,
          "tool": "delete_data",
          "environment": "staging",
          "message": "confirm it",
          "retry_with": {
            "confirm": true
          }
        }
        "###);
    }

    #[test]
    fn test_metadata_notice_and_masked_fields() {
        let meta = Metadata::with_rows(5, 1)
            .with_notice("masked")
            .with_masked_fields(vec!["email".into()]);
        let json = serde_json::to_string(&meta).unwrap();

        assert!(json.contains(r#""notice":"masked""#));
        assert!(json.contains(r#""masked_fields":["email"]"#));
    }

    #[test]
    fn test_metadata_without_rows() {
        let meta = Metadata::new(100);
        let json = serde_json::to_string(&meta).unwrap();

        assert!(json.contains(r#""execution_ms":100"#));
        // rows_returned should be omitted when None
        assert!(!json.contains("rows_returned"));
    }

    #[test]
    fn test_status_strings_match_serialization() {
        let response = ToolResponse::Error(ErrorEnvelope::new(
            "local",
            "nope",
            ErrorInfo::new("PERMISSION_DENIED", "Unknown tool"),
        ));
        assert_eq!(response.to_value()["status"], response.status());
    }
}
