//! Confirmation Gate
//!
//! Under a `ConfirmRequired` tier, tools flagged `requires_confirmation` only run when
//! the call itself carries `confirm: true`. The gate keeps no memory between calls: a
//! confirmed call does not unlock later ones.

use serde::Serialize;

use crate::permission::{decide, PermissionDecision, PermissionTier};
use crate::tools::ToolDescriptor;

/// Prompt returned instead of executing an unconfirmed call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationPrompt {
    /// Tool that was withheld
    pub tool: String,
    /// Environment the call targeted
    pub environment: String,
    /// Instruction for the caller
    pub message: String,
    /// Argument to add when re-invoking
    pub retry_with: serde_json::Value,
}

/// Outcome of the confirmation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Continue to execution
    Proceed,
    /// Stop here and ask the caller to re-issue the call with `confirm: true`
    ConfirmationRequired(ConfirmationPrompt),
}

/// Decide whether an already permitted call may proceed
#[must_use]
pub fn check(tool: &ToolDescriptor, tier: PermissionTier, environment: &str, confirmed: bool) -> Gate {
    match decide(tool, tier) {
        PermissionDecision::NeedsConfirmation if !confirmed => {
            Gate::ConfirmationRequired(prompt(tool.name, environment))
        }
        _ => Gate::Proceed,
    }
}

fn prompt(tool: &str, environment: &str) -> ConfirmationPrompt {
    ConfirmationPrompt {
        tool: tool.to_string(),
        environment: environment.to_string(),
        message: format!(
            "'{tool}' modifies data in environment '{environment}', which requires explicit confirmation. \
             Review the request and call '{tool}' again with the same arguments and \"confirm\": true."
        ),
        retry_with: serde_json::json!({ "confirm": true }),
    }
}
