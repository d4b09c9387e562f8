use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use secrecy::SecretString;
use tracing::{debug, instrument};

use super::{account_error_status, types::SignupRequest};
use crate::accounts::AccountLifecycle;

pub const SIGNUP_OK: &str = "Registration successful. Check your email to verify your account.";

#[utoipa::path(
    post,
    path= "/auth/signup",
    request_body = SignupRequest,
    responses (
        (status = 200, description = "Account created, verification email sent", body = String, content_type = "text/plain"),
        (status = 400, description = "Email already taken or invalid input", body = String, content_type = "text/plain"),
    ),
    tag= "auth"
)]
#[instrument(skip(lifecycle, payload))]
pub async fn signup(
    lifecycle: Extension<AccountLifecycle>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()),
    };

    debug!("signup: {:?}", request);

    let Some(email) = request.email.as_deref() else {
        return (StatusCode::BAD_REQUEST, "email is required".to_string());
    };
    let Some(password) = request.password.clone() else {
        return (StatusCode::BAD_REQUEST, "password is required".to_string());
    };

    match lifecycle
        .signup(email, &SecretString::from(password), request.profile())
        .await
    {
        Ok(()) => (StatusCode::OK, SIGNUP_OK.to_string()),
        Err(err) => account_error_status(&err),
    }
}
