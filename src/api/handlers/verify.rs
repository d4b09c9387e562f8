use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::instrument;

use super::{account_error_status, types::VerifyQuery};
use crate::accounts::{AccountError, AccountLifecycle};

pub const VERIFY_OK: &str = "Account verified successfully.";

#[utoipa::path(
    get,
    path= "/auth/verify",
    params(VerifyQuery),
    responses (
        (status = 200, description = "Account enabled", body = String, content_type = "text/plain"),
        (status = 400, description = "Token expired or unknown", body = String, content_type = "text/plain"),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn verify(
    lifecycle: Extension<AccountLifecycle>,
    query: Option<Query<VerifyQuery>>,
) -> impl IntoResponse {
    let Some(token) = query.and_then(|Query(query)| query.token) else {
        return account_error_status(&AccountError::TokenNotFound);
    };

    match lifecycle.verify(&token).await {
        Ok(()) => (StatusCode::OK, VERIFY_OK.to_string()),
        Err(err) => account_error_status(&err),
    }
}
