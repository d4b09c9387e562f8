//! Identity headers the gateway attaches to forwarded requests.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::token::Claims;

pub const USER_EMAIL: HeaderName = HeaderName::from_static("useremail");
pub const USER_PHONE: HeaderName = HeaderName::from_static("userphone");
pub const USER_NAME: HeaderName = HeaderName::from_static("username");
pub const USER_LAST_NAME: HeaderName = HeaderName::from_static("userlastname");
pub const USER_ADDRESS: HeaderName = HeaderName::from_static("useraddress");

pub const IDENTITY_HEADERS: [HeaderName; 5] =
    [USER_EMAIL, USER_PHONE, USER_NAME, USER_LAST_NAME, USER_ADDRESS];

/// Remove every identity header, whatever its casing on the wire.
pub fn strip(headers: &mut HeaderMap) {
    for name in &IDENTITY_HEADERS {
        headers.remove(name);
    }
}

/// Write identity headers for verified claims. Absent claims produce no header.
pub fn inject(headers: &mut HeaderMap, claims: &Claims) {
    let values = [
        (USER_EMAIL, Some(claims.sub.as_str())),
        (USER_PHONE, claims.phone.as_deref()),
        (USER_NAME, claims.name.as_deref()),
        (USER_LAST_NAME, claims.last_name.as_deref()),
        (USER_ADDRESS, claims.address.as_deref()),
    ];

    for (name, value) in values {
        let Some(value) = value else {
            continue;
        };
        match HeaderValue::from_bytes(value.as_bytes()) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => warn!(header = %name, "claim value is not a valid header value, skipped"),
        }
    }
}

/// Identity a downstream handler receives from the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayIdentity {
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for GatewayIdentity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get(USER_EMAIL)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": "Missing identity"})),
                )
                    .into_response()
            })?;

        Ok(Self {
            email: email.to_string(),
        })
    }
}
