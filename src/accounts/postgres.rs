//! PostgreSQL-backed [`CredentialStore`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use std::time::Duration;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::model::{Account, ConsumeOutcome, Profile, Role, VerificationToken};
use super::store::{CredentialStore, StoreError};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if missing.
    ///
    /// # Errors
    /// Returns an error if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        let span = info_span!("db.query", db.system = "postgresql", db.operation = "DDL");
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("Failed to apply database schema")?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(Account {
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        profile: Profile {
            name: row.try_get("name")?,
            last_name: row.try_get("last_name")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
        },
        role: role.parse::<Role>().unwrap_or_default(),
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
    })
}

fn token_from_row(row: &PgRow) -> Result<VerificationToken, sqlx::Error> {
    Ok(VerificationToken {
        id: row.try_get("id")?,
        account_email: row.try_get("account_email")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn backend(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| StoreError::Backend(anyhow::Error::new(err).context(context))
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_account(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let query = "SELECT email, password_hash, name, last_name, phone, address, role, enabled, created_at FROM accounts WHERE email = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(backend("Failed to look up account"))?;

        row.as_ref()
            .map(account_from_row)
            .transpose()
            .map_err(backend("Failed to decode account"))
    }

    async fn insert_account(
        &self,
        account: &Account,
        token: &VerificationToken,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(backend("Failed to begin transaction"))?;

        let query = "INSERT INTO accounts (email, password_hash, name, last_name, phone, address, role, enabled, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let inserted = sqlx::query(query)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.profile.name.as_deref())
            .bind(account.profile.last_name.as_deref())
            .bind(account.profile.phone.as_deref())
            .bind(account.profile.address.as_deref())
            .bind(account.role.as_str())
            .bind(account.enabled)
            .bind(account.created_at)
            .execute(&mut *tx)
            .instrument(span)
            .await;

        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                return Err(StoreError::Conflict);
            }
            return Err(backend("Failed to insert account")(err));
        }

        let query = "INSERT INTO verification_tokens (id, account_email, created_at, expires_at) VALUES ($1, $2, $3, $4)";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token.id)
            .bind(&token.account_email)
            .bind(token.created_at)
            .bind(token.expires_at)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .map_err(backend("Failed to insert verification token"))?;

        tx.commit()
            .await
            .map_err(backend("Failed to commit account"))?;
        Ok(())
    }

    async fn consume_verification_token(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(backend("Failed to begin transaction"))?;

        // Row lock serialises concurrent consumers of the same token.
        let query = "SELECT id, account_email, created_at, expires_at FROM verification_tokens WHERE id = $1 FOR UPDATE";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .map_err(backend("Failed to lock verification token"))?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(backend("Failed to roll back"))?;
            return Ok(ConsumeOutcome::NotFound);
        };
        let token = token_from_row(&row).map_err(backend("Failed to decode verification token"))?;

        if token.is_expired_at(now) {
            tx.rollback()
                .await
                .map_err(backend("Failed to roll back"))?;
            return Ok(ConsumeOutcome::Expired);
        }

        let query = "UPDATE accounts SET enabled = TRUE WHERE email = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&token.account_email)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .map_err(backend("Failed to enable account"))?;

        let query = "DELETE FROM verification_tokens WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .map_err(backend("Failed to delete verification token"))?;

        tx.commit()
            .await
            .map_err(backend("Failed to commit verification"))?;

        Ok(ConsumeOutcome::Verified {
            email: token.account_email,
        })
    }

    async fn purge_expired_verification_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let query = "DELETE FROM verification_tokens WHERE expires_at < $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(backend("Failed to purge verification tokens"))?;
        Ok(result.rows_affected())
    }
}
