//! Signup, email verification and signin.
//!
//! Accounts move `Unregistered -> PendingVerification -> Active`. Signin does
//! not look at the `enabled` flag, so a pending account can already obtain a
//! bearer token.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::email::{build_verify_url, EmailSender, VerificationEmail};
use super::model::{
    Account, ConsumeOutcome, Profile, Role, VerificationToken, DEFAULT_VERIFICATION_TTL_HOURS,
};
use super::password::{hash_password, verify_password, PasswordError};
use super::store::{CredentialStore, StoreError};
use crate::token::{TokenCodec, TokenError};

pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),
    #[error("Email already taken")]
    DuplicateEmail,
    #[error("Bad credentials")]
    BadCredentials,
    #[error("Invalid token.")]
    TokenNotFound,
    #[error("Token expired.")]
    TokenExpired,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("storage failure: {0}")]
    Store(anyhow::Error),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::DuplicateEmail,
            StoreError::Backend(err) => Self::Store(err),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LifecycleConfig {
    public_base_url: String,
    verification_ttl: Duration,
}

impl LifecycleConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            verification_ttl: Duration::hours(DEFAULT_VERIFICATION_TTL_HOURS),
        }
    }

    #[must_use]
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_verification_ttl(mut self, ttl: Duration) -> Self {
        self.verification_ttl = ttl;
        self
    }

}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

#[derive(Clone)]
pub struct AccountLifecycle {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    mailer: Arc<dyn EmailSender>,
    config: LifecycleConfig,
}

impl AccountLifecycle {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: TokenCodec,
        mailer: Arc<dyn EmailSender>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            codec,
            mailer,
            config,
        }
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn CredentialStore> {
        self.store.clone()
    }

    /// # Errors
    /// Returns [`AccountError::Store`] if the lookup fails.
    pub async fn find_account(&self, email: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.store.find_account(&normalize_email(email)).await?)
    }

    /// Register a new, disabled account and send its verification link.
    ///
    /// # Errors
    /// Returns [`AccountError::Validation`] for a malformed email or empty
    /// password, [`AccountError::DuplicateEmail`] if the email is registered.
    #[instrument(skip(self, password, profile))]
    pub async fn signup(
        &self,
        email: &str,
        password: &SecretString,
        profile: Profile,
    ) -> Result<(), AccountError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AccountError::Validation("email is required".to_string()));
        }
        if !valid_email(&email) {
            return Err(AccountError::Validation("email is not valid".to_string()));
        }
        if password.expose_secret().is_empty() {
            return Err(AccountError::Validation("password is required".to_string()));
        }

        if self.store.find_account(&email).await?.is_some() {
            debug!("signup rejected, email already registered");
            return Err(AccountError::DuplicateEmail);
        }

        let password_hash = hash_blocking(password.clone()).await?;
        let now = Utc::now();
        let account = Account::new(
            email.clone(),
            password_hash,
            profile.normalized(),
            Role::User,
            now,
        );
        let token = VerificationToken::new(&email, now, self.config.verification_ttl);

        // A concurrent signup that won the race surfaces here as Conflict.
        self.store.insert_account(&account, &token).await?;

        let message = VerificationEmail {
            to: account.email.clone(),
            name: account.profile.name.clone(),
            last_name: account.profile.last_name.clone(),
            link: build_verify_url(&self.config.public_base_url, token.id),
        };
        if let Err(err) = self.mailer.send(&message) {
            warn!("failed to send verification email: {err}");
        }

        Ok(())
    }

    /// Check credentials and issue a bearer token.
    ///
    /// # Errors
    /// Returns [`AccountError::BadCredentials`] if the account is unknown or
    /// the password does not match.
    #[instrument(skip(self, password))]
    pub async fn signin(&self, email: &str, password: &SecretString) -> Result<String, AccountError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AccountError::Validation("email is required".to_string()));
        }
        if !valid_email(&email) {
            return Err(AccountError::Validation("email is not valid".to_string()));
        }

        let Some(account) = self.store.find_account(&email).await? else {
            debug!("signin failed");
            return Err(AccountError::BadCredentials);
        };

        if !verify_blocking(password.clone(), account.password_hash.clone()).await? {
            debug!("signin failed");
            return Err(AccountError::BadCredentials);
        }

        Ok(self.codec.issue(&account)?)
    }

    /// Consume a verification token and enable its account.
    ///
    /// # Errors
    /// Returns [`AccountError::TokenNotFound`] for unknown or unparsable ids
    /// and [`AccountError::TokenExpired`] once past expiry.
    pub async fn verify(&self, token_id: &str) -> Result<(), AccountError> {
        self.verify_at(token_id, Utc::now()).await
    }

    /// # Errors
    /// See [`AccountLifecycle::verify`].
    #[instrument(skip(self))]
    pub async fn verify_at(&self, token_id: &str, now: DateTime<Utc>) -> Result<(), AccountError> {
        let Ok(id) = Uuid::parse_str(token_id.trim()) else {
            return Err(AccountError::TokenNotFound);
        };

        match self.store.consume_verification_token(id, now).await? {
            ConsumeOutcome::Verified { email } => {
                debug!(email = %email, "account verified");
                Ok(())
            }
            ConsumeOutcome::Expired => Err(AccountError::TokenExpired),
            ConsumeOutcome::NotFound => Err(AccountError::TokenNotFound),
        }
    }
}

async fn hash_blocking(password: SecretString) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || hash_password(password.expose_secret()))
        .await
        .map_err(|err| AccountError::Store(anyhow::anyhow!("hashing task failed: {err}")))?
        .map_err(AccountError::from)
}

async fn verify_blocking(password: SecretString, hash: String) -> Result<bool, AccountError> {
    let result = tokio::task::spawn_blocking(move || verify_password(password.expose_secret(), &hash))
        .await
        .map_err(|err| AccountError::Store(anyhow::anyhow!("verification task failed: {err}")))?;

    match result {
        Ok(matches) => Ok(matches),
        // A stored hash we cannot parse never matches.
        Err(PasswordError::InvalidHashFormat) => Ok(false),
        Err(err) => Err(err.into()),
    }
}
