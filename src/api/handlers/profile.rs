use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::SecondsFormat;
use tracing::{debug, instrument};

use super::{account_error_status, json_error, types::{AccountProfile, ErrorResponse}};
use crate::accounts::{Account, AccountLifecycle};
use crate::gateway::GatewayIdentity;

impl From<Account> for AccountProfile {
    fn from(account: Account) -> Self {
        Self {
            email: account.email,
            role: account.role,
            enabled: account.enabled,
            profile: account.profile,
            created_at: account
                .created_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Sample downstream endpoint: trusts the identity the gateway attached.
#[utoipa::path(
    get,
    path= "/test",
    params(
        ("userEmail" = String, Header, description = "Account email injected by the gateway")
    ),
    responses (
        (status = 200, description = "Profile of the calling account", body = AccountProfile),
        (status = 401, description = "No gateway identity on the request", body = ErrorResponse),
        (status = 404, description = "Unknown account", body = ErrorResponse),
    ),
    tag= "diagnostics"
)]
#[instrument(skip(lifecycle))]
pub async fn profile(lifecycle: Extension<AccountLifecycle>, identity: GatewayIdentity) -> Response {
    match lifecycle.find_account(&identity.email).await {
        Ok(Some(account)) => (StatusCode::OK, Json(AccountProfile::from(account))).into_response(),
        Ok(None) => {
            debug!("no account for gateway identity");
            json_error(StatusCode::NOT_FOUND, "Account not found")
        }
        Err(err) => {
            let (status, message) = account_error_status(&err);
            json_error(status, message)
        }
    }
}
