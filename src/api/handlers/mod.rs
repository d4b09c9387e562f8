pub mod health;
pub mod profile;
pub mod signin;
pub mod signup;
pub mod token_info;
pub mod types;
pub mod verify;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::accounts::AccountError;
use types::ErrorResponse;

pub(crate) fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Status code and client-facing message for an account error. Internal
/// failures are logged here and reported without detail.
pub(crate) fn account_error_status(err: &AccountError) -> (StatusCode, String) {
    match err {
        AccountError::Validation(_)
        | AccountError::DuplicateEmail
        | AccountError::TokenNotFound
        | AccountError::TokenExpired => (StatusCode::BAD_REQUEST, err.to_string()),
        AccountError::BadCredentials => (StatusCode::UNAUTHORIZED, err.to_string()),
        AccountError::Password(_) | AccountError::Token(_) | AccountError::Store(_) => {
            error!("account operation failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}
