//! Outcome of a capability or quota question.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ErrorCode;

use super::MembershipTier;

/// Allow/deny decision with an optional upsell.
///
/// A denial always carries a machine-readable `code` and a human-readable
/// `reason`; `upgrade` is the next tier above the user's effective tier, or
/// `None` when the user is already at the top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<MembershipTier>,
}

impl CheckResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            code: None,
            upgrade: None,
        }
    }

    pub fn denied(
        code: ErrorCode,
        reason: impl Into<String>,
        upgrade: Option<MembershipTier>,
    ) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            code: Some(code),
            upgrade,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}
