use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use tracing::instrument;

use super::{
    account_error_status, json_error,
    types::{ErrorResponse, SigninRequest, SigninResponse},
};
use crate::accounts::AccountLifecycle;

#[utoipa::path(
    post,
    path= "/auth/signin",
    request_body = SigninRequest,
    responses (
        (status = 200, description = "Bearer token issued", body = SigninResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Bad credentials", body = ErrorResponse),
    ),
    tag= "auth"
)]
#[instrument(skip(lifecycle, payload))]
pub async fn signin(
    lifecycle: Extension<AccountLifecycle>,
    payload: Option<Json<SigninRequest>>,
) -> Response {
    let request: SigninRequest = match payload {
        Some(Json(payload)) => payload,
        None => return json_error(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let Some(email) = request.email.as_deref() else {
        return json_error(StatusCode::BAD_REQUEST, "email is required");
    };
    let Some(password) = request.password.clone() else {
        return json_error(StatusCode::BAD_REQUEST, "password is required");
    };

    match lifecycle.signin(email, &SecretString::from(password)).await {
        Ok(token) => (StatusCode::OK, Json(SigninResponse { token })).into_response(),
        Err(err) => {
            let (status, message) = account_error_status(&err);
            json_error(status, message)
        }
    }
}
