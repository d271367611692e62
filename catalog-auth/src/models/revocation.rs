use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a token family was revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    Logout,
    ReplayDetected,
    PasswordChanged,
    AccountDeactivated,
    /// Role or shop changed administratively.
    RoleChanged,
}

impl RevocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationReason::Logout => "logout",
            RevocationReason::ReplayDetected => "replay_detected",
            RevocationReason::PasswordChanged => "password_changed",
            RevocationReason::AccountDeactivated => "account_deactivated",
            RevocationReason::RoleChanged => "role_changed",
        }
    }
}

impl std::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger record marking a family as terminally revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub token_family: String,
    pub revoked_at: DateTime<Utc>,
    pub reason: RevocationReason,
}

impl RevocationEntry {
    pub fn new(token_family: impl Into<String>, reason: RevocationReason) -> Self {
        Self {
            token_family: token_family.into(),
            revoked_at: Utc::now(),
            reason,
        }
    }
}
