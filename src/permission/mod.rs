//! Permission Engine
//!
//! Pure decision table mapping (tool category, environment tier) to a verdict.
//!
//! | Tier            | Administrative | ReadOnly | WriteOperation          |
//! |-----------------|----------------|----------|-------------------------|
//! | ReadOnly        | allowed        | allowed  | blocked                 |
//! | ConfirmRequired | allowed        | allowed  | allowed (after confirm) |
//! | FullAccess      | allowed        | allowed  | allowed                 |
//!
//! Administrative tools stay available everywhere so a caller can always leave a
//! locked-down environment. Unknown tool names are never allowed.

use serde::{Deserialize, Serialize};

use crate::tools::{ToolCategory, ToolDescriptor, ToolKind};

/// Permission level of an environment, fixed at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionTier {
    /// Every tool runs without confirmation
    FullAccess,
    /// Write-shaped tools are blocked
    ReadOnly,
    /// Write-shaped tools run only when the call carries `confirm: true`
    ConfirmRequired,
}

// Least privilege when a configuration omits the tier
impl Default for PermissionTier {
    fn default() -> Self {
        Self::ReadOnly
    }
}

impl PermissionTier {
    /// Get the tier name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FullAccess => "full_access",
            Self::ReadOnly => "read_only",
            Self::ConfirmRequired => "confirm_required",
        }
    }
}

impl std::fmt::Display for PermissionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verdict for one tool call, derived per request and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    /// Execute immediately
    Allowed,
    /// Refuse before execution
    Blocked,
    /// Execute only if the call carries an explicit confirmation
    NeedsConfirmation,
}

/// Whether a tool may run at all under `tier`
#[must_use]
pub const fn is_allowed(tool: &ToolDescriptor, tier: PermissionTier) -> bool {
    match (tool.category, tier) {
        (ToolCategory::Administrative | ToolCategory::ReadOnly, _) => true,
        (ToolCategory::WriteOperation, PermissionTier::ReadOnly) => false,
        (ToolCategory::WriteOperation, PermissionTier::ConfirmRequired | PermissionTier::FullAccess) => true,
    }
}

/// Whether a tool, looked up by name, may run under `tier`
#[must_use]
pub fn is_allowed_by_name(name: &str, tier: PermissionTier) -> bool {
    ToolKind::from_name(name).is_some_and(|kind| is_allowed(kind.descriptor(), tier))
}

/// Combine the decision table with the confirmation rule
#[must_use]
pub const fn decide(tool: &ToolDescriptor, tier: PermissionTier) -> PermissionDecision {
    if !is_allowed(tool, tier) {
        return PermissionDecision::Blocked;
    }

    match tier {
        PermissionTier::ConfirmRequired if tool.requires_confirmation => {
            PermissionDecision::NeedsConfirmation
        }
        _ => PermissionDecision::Allowed,
    }
}
