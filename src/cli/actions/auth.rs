use crate::{
    accounts::{
        AccountLifecycle, CredentialStore, LifecycleConfig, LogEmailSender, MemoryCredentialStore,
        PgCredentialStore,
    },
    api,
    cli::globals::GlobalArgs,
    token::{SigningKey, TokenCodec},
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub port: u16,
    pub dsn: Option<String>,
    pub public_base_url: String,
    pub verification_ttl_hours: i64,
    pub token_ttl_seconds: i64,
    pub purge_interval_seconds: u64,
}

/// Execute the auth action.
/// # Errors
/// Returns an error if the signing key is invalid, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let key = SigningKey::from_base64(&args.globals.signing_key)
        .context("Invalid AUTHGATE_SIGNING_KEY")?;
    let codec = TokenCodec::new(key).with_ttl_seconds(args.token_ttl_seconds);

    let store: Arc<dyn CredentialStore> = if let Some(dsn) = &args.dsn {
        let store = PgCredentialStore::connect(dsn)
            .await
            .context("Could not connect to the database")?;
        store
            .ensure_schema()
            .await
            .context("Could not prepare the database schema")?;
        Arc::new(store)
    } else {
        warn!("no --dsn given, accounts are kept in memory and lost on restart");
        Arc::new(MemoryCredentialStore::new())
    };

    let config = LifecycleConfig::new()
        .with_public_base_url(args.public_base_url.clone())
        .with_verification_ttl(chrono::Duration::hours(args.verification_ttl_hours));

    let lifecycle = AccountLifecycle::new(store, codec, Arc::new(LogEmailSender), config);

    api::new(
        args.port,
        lifecycle,
        Duration::from_secs(args.purge_interval_seconds),
    )
    .await
}

fn log_startup_args(args: &Args) {
    let dsn = args
        .dsn
        .as_deref()
        .map_or_else(|| "memory".to_string(), redact_dsn);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = crate::GIT_COMMIT_HASH,
        port = args.port,
        dsn = %dsn,
        public_base_url = %args.public_base_url,
        verification_ttl_hours = args.verification_ttl_hours,
        token_ttl_seconds = args.token_ttl_seconds,
        purge_interval_seconds = args.purge_interval_seconds,
        "starting auth service"
    );
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}
