use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::SecondsFormat;

use super::types::{ErrorResponse, TokenInfo};
use crate::accounts::AccountLifecycle;
use crate::gateway::{auth::bearer_token, GatewayError};
use crate::token::{now_unix_seconds, Claims};

fn rfc3339(value: Option<chrono::DateTime<chrono::Utc>>) -> Option<String> {
    value.map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

impl From<Claims> for TokenInfo {
    fn from(claims: Claims) -> Self {
        Self {
            issued_at: rfc3339(claims.issued_at()),
            expires_at: rfc3339(claims.expires_at()),
            email: claims.email,
            role: claims.role,
            name: claims.name,
            last_name: claims.last_name,
            address: claims.address,
            phone: claims.phone,
        }
    }
}

#[utoipa::path(
    get,
    path= "/test/token-info",
    responses (
        (status = 200, description = "Decoded claims of the presented bearer token", body = TokenInfo),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag= "diagnostics"
)]
pub async fn token_info(lifecycle: Extension<AccountLifecycle>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return GatewayError::MissingAuthHeader.into_response();
    };

    match lifecycle.codec().verify_fresh(token, now_unix_seconds()) {
        Ok(claims) => (StatusCode::OK, Json(TokenInfo::from(claims))).into_response(),
        Err(_) => GatewayError::InvalidToken.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Role;

    #[test]
    fn claims_render_as_rfc3339() {
        let claims = Claims {
            sub: "ada@example.com".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::Admin,
            name: Some("Ada".to_string()),
            last_name: None,
            phone: None,
            address: Some("London".to_string()),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
        };

        let info = TokenInfo::from(claims);
        assert_eq!(info.issued_at.as_deref(), Some("2023-11-14T22:13:20Z"));
        assert_eq!(info.expires_at.as_deref(), Some("2023-11-14T23:13:20Z"));
        assert_eq!(info.role, Role::Admin);
        assert_eq!(info.address.as_deref(), Some("London"));
    }
}
