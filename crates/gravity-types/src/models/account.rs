//! Account model and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an upstream account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Verified usable; the only status eligible for selection.
    Active,
    /// Refresh token no longer produces an access token.
    Expired,
    /// Upstream rejected the account with 401/403 during verification.
    Banned,
    /// Not yet verified, or verification was inconclusive.
    Unknown,
    /// A verification pass is in flight.
    Checking,
}

impl AccountStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Banned => "banned",
            Self::Unknown => "unknown",
            Self::Checking => "checking",
        }
    }

    /// Parse from a stored string; anything unrecognized maps to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "expired" => Self::Expired,
            "banned" => Self::Banned,
            "checking" => Self::Checking,
            _ => Self::Unknown,
        }
    }
}

/// Subscription tier of an account. Lower rank is preferred by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Ultra,
    Pro,
    Free,
    Unknown,
}

impl AccountType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ultra => "ultra",
            Self::Pro => "pro",
            Self::Free => "free",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ultra" => Self::Ultra,
            "pro" => Self::Pro,
            "free" => Self::Free,
            _ => Self::Unknown,
        }
    }

    /// Ordering rank used by the selector: ultra < pro < free < other.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Ultra => 1,
            Self::Pro => 2,
            Self::Free => 3,
            Self::Unknown => 4,
        }
    }
}

/// A stored upstream credential identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Never exposed through the API.
    #[serde(skip)]
    pub refresh_token: String,
    #[serde(skip)]
    pub access_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub status: AccountStatus,
    pub account_type: AccountType,
    pub quota_used: i64,
    pub quota_limit: i64,
    pub quota_reset_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Remaining quota; negative when over-consumed, zero when unknown.
    pub fn remaining_quota(&self) -> i64 {
        self.quota_limit.saturating_sub(self.quota_used)
    }

    /// Whether the access token is usable without a refresh at `now`,
    /// with the given safety margin before expiry.
    pub fn token_fresh_at(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        match (&self.access_token, self.token_expiry) {
            (Some(token), Some(expiry)) => !token.is_empty() && now < expiry - margin,
            _ => false,
        }
    }
}

/// Input for creating or updating an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInput {
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub refresh_token: String,
    #[serde(default)]
    pub account_type: Option<AccountType>,
}

/// Exportable account data (includes the refresh token).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountExport {
    pub name: String,
    pub email: String,
    pub refresh_token: String,
    pub account_type: AccountType,
}

impl From<&Account> for AccountExport {
    fn from(a: &Account) -> Self {
        Self {
            name: a.name.clone(),
            email: a.email.clone(),
            refresh_token: a.refresh_token.clone(),
            account_type: a.account_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            AccountStatus::Active,
            AccountStatus::Expired,
            AccountStatus::Banned,
            AccountStatus::Unknown,
            AccountStatus::Checking,
        ] {
            assert_eq!(AccountStatus::parse(status.as_str()), status);
        }
        assert_eq!(AccountStatus::parse("garbage"), AccountStatus::Unknown);
    }

    #[test]
    fn test_tier_rank_ordering() {
        assert!(AccountType::Ultra.rank() < AccountType::Pro.rank());
        assert!(AccountType::Pro.rank() < AccountType::Free.rank());
        assert!(AccountType::Free.rank() < AccountType::Unknown.rank());
        assert_eq!(AccountType::parse("enterprise"), AccountType::Unknown);
    }
}
