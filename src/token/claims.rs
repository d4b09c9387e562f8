//! Typed bearer token claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accounts::{Account, Role};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    pub(super) fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Identity and profile claims carried by an issued bearer token.
///
/// `sub` is always the account email; `email` repeats it for consumers that
/// read the address under that name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn for_account(account: &Account, issued_at: i64, ttl_seconds: i64) -> Self {
        Self {
            sub: account.email.clone(),
            email: account.email.clone(),
            role: account.role,
            name: account.profile.name.clone(),
            last_name: account.profile.last_name.clone(),
            phone: account.profile.phone.clone(),
            address: account.profile.address.clone(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_seconds),
        }
    }

    /// A token is expired once `now` reaches `exp`.
    #[must_use]
    pub fn is_expired_at(&self, now_unix_seconds: i64) -> bool {
        self.exp <= now_unix_seconds
    }

    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
