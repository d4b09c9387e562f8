//! Account and verification token records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_VERIFICATION_TTL_HOURS: i64 = 24;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Profile fields embedded into issued tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Profile {
    /// Trim every field and drop the ones left empty.
    #[must_use]
    pub fn normalized(self) -> Self {
        let clean = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            name: clean(self.name),
            last_name: clean(self.last_name),
            phone: clean(self.phone),
            address: clean(self.address),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub profile: Profile,
    pub role: Role,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// New accounts start disabled until their email is verified.
    #[must_use]
    pub fn new(
        email: String,
        password_hash: String,
        profile: Profile,
        role: Role,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            email,
            password_hash,
            profile,
            role,
            enabled: false,
            created_at,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("email", &self.email)
            .field("password_hash", &"***")
            .field("profile", &self.profile)
            .field("role", &self.role)
            .field("enabled", &self.enabled)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Single-use proof of control over the registered email address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationToken {
    pub id: Uuid,
    pub account_email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    #[must_use]
    pub fn new(account_email: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_email: account_email.to_string(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Result of an atomic check-and-delete on a verification token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Token deleted and the owning account enabled.
    Verified { email: String },
    /// Token kept, account untouched.
    Expired,
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("USER".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::default().to_string(), "USER");
    }

    #[test]
    fn profile_normalized_drops_blank_fields() {
        let profile = Profile {
            name: Some("  Grace ".to_string()),
            last_name: Some("   ".to_string()),
            phone: None,
            address: Some("Arlington".to_string()),
        }
        .normalized();

        assert_eq!(profile.name.as_deref(), Some("Grace"));
        assert_eq!(profile.last_name, None);
        assert_eq!(profile.address.as_deref(), Some("Arlington"));
    }

    #[test]
    fn verification_token_expires_after_ttl() {
        let now = Utc::now();
        let token = VerificationToken::new("a@example.com", now, Duration::hours(24));
        assert!(!token.is_expired_at(now + Duration::hours(24)));
        assert!(token.is_expired_at(now + Duration::hours(24) + Duration::seconds(1)));
    }

    #[test]
    fn account_debug_hides_password_hash() {
        let account = Account::new(
            "a@example.com".to_string(),
            "$argon2id$v=19$secret".to_string(),
            Profile::default(),
            Role::User,
            Utc::now(),
        );
        let debug = format!("{account:?}");
        assert!(!debug.contains("argon2id"));
        assert!(!account.enabled);
    }
}
