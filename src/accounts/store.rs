//! Persistence seam for accounts and verification tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::model::{Account, ConsumeOutcome, VerificationToken};

#[derive(Debug, Error)]
pub enum StoreError {
    /// An account with the same email already exists.
    #[error("account already exists")]
    Conflict,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_account(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Persist a new account together with its first verification token.
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] if the email is already registered.
    async fn insert_account(
        &self,
        account: &Account,
        token: &VerificationToken,
    ) -> Result<(), StoreError>;

    /// Check expiry, enable the owner and delete the token as one atomic step.
    /// Expired tokens are left in place.
    async fn consume_verification_token(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError>;

    /// Delete tokens whose expiry is before `now`, returning how many went.
    async fn purge_expired_verification_tokens(&self, now: DateTime<Utc>)
        -> Result<u64, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    tokens: HashMap<Uuid, VerificationToken>,
}

/// In-process store, used when no database DSN is configured and in tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: Mutex<MemoryState>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding verification tokens for `email`.
    pub async fn tokens_for(&self, email: &str) -> Vec<VerificationToken> {
        let state = self.state.lock().await;
        state
            .tokens
            .values()
            .filter(|token| token.account_email == email)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_account(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.state.lock().await.accounts.get(email).cloned())
    }

    async fn insert_account(
        &self,
        account: &Account,
        token: &VerificationToken,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&account.email) {
            return Err(StoreError::Conflict);
        }
        state
            .accounts
            .insert(account.email.clone(), account.clone());
        state.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn consume_verification_token(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut state = self.state.lock().await;

        let Some(token) = state.tokens.get(&id) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if token.is_expired_at(now) {
            return Ok(ConsumeOutcome::Expired);
        }

        let email = token.account_email.clone();
        state.tokens.remove(&id);
        match state.accounts.get_mut(&email) {
            Some(account) => {
                account.enabled = true;
                Ok(ConsumeOutcome::Verified { email })
            }
            None => Ok(ConsumeOutcome::NotFound),
        }
    }

    async fn purge_expired_verification_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.tokens.len();
        state.tokens.retain(|_, token| !token.is_expired_at(now));
        Ok(u64::try_from(before - state.tokens.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::model::{Profile, Role};
    use chrono::Duration;

    async fn has_token(store: &MemoryCredentialStore, id: Uuid) -> bool {
        store.state.lock().await.tokens.contains_key(&id)
    }

    fn account(email: &str, now: DateTime<Utc>) -> Account {
        Account::new(
            email.to_string(),
            "hash".to_string(),
            Profile::default(),
            Role::User,
            now,
        )
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() -> Result<(), StoreError> {
        let store = MemoryCredentialStore::new();
        let now = Utc::now();
        let first = VerificationToken::new("a@example.com", now, Duration::hours(1));
        store.insert_account(&account("a@example.com", now), &first).await?;

        let second = VerificationToken::new("a@example.com", now, Duration::hours(1));
        let result = store
            .insert_account(&account("a@example.com", now), &second)
            .await;
        assert!(matches!(result, Err(StoreError::Conflict)));
        assert_eq!(store.tokens_for("a@example.com").await, vec![first]);
        Ok(())
    }

    #[tokio::test]
    async fn consume_enables_account_once() -> Result<(), StoreError> {
        let store = MemoryCredentialStore::new();
        let now = Utc::now();
        let token = VerificationToken::new("a@example.com", now, Duration::hours(1));
        store.insert_account(&account("a@example.com", now), &token).await?;

        assert_eq!(
            store.consume_verification_token(token.id, now).await?,
            ConsumeOutcome::Verified {
                email: "a@example.com".to_string()
            }
        );
        assert_eq!(
            store.consume_verification_token(token.id, now).await?,
            ConsumeOutcome::NotFound
        );
        let stored = store.find_account("a@example.com").await?;
        assert!(stored.is_some_and(|a| a.enabled));
        Ok(())
    }

    #[tokio::test]
    async fn consume_keeps_expired_token() -> Result<(), StoreError> {
        let store = MemoryCredentialStore::new();
        let now = Utc::now();
        let token = VerificationToken::new("a@example.com", now, Duration::hours(1));
        store.insert_account(&account("a@example.com", now), &token).await?;

        let later = now + Duration::hours(2);
        assert_eq!(
            store.consume_verification_token(token.id, later).await?,
            ConsumeOutcome::Expired
        );
        assert!(has_token(&store, token.id).await);
        let stored = store.find_account("a@example.com").await?;
        assert!(stored.is_some_and(|a| !a.enabled));
        Ok(())
    }

    #[tokio::test]
    async fn purge_removes_only_expired() -> Result<(), StoreError> {
        let store = MemoryCredentialStore::new();
        let now = Utc::now();
        let old = VerificationToken::new("old@example.com", now - Duration::hours(48), Duration::hours(24));
        let fresh = VerificationToken::new("new@example.com", now, Duration::hours(24));
        store.insert_account(&account("old@example.com", now), &old).await?;
        store.insert_account(&account("new@example.com", now), &fresh).await?;

        assert_eq!(store.purge_expired_verification_tokens(now).await?, 1);
        assert!(!has_token(&store, old.id).await);
        assert!(has_token(&store, fresh.id).await);
        Ok(())
    }
}
