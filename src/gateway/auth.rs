//! Authentication stages of the gateway pipeline.

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use super::identity;
use super::pipeline::{Flow, Stage};
use super::routes::RouteClassifier;
use crate::token::{now_unix_seconds, Claims, TokenCodec, TokenError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Missing Authorization Header")]
    MissingAuthHeader,
    #[error("Invalid Token: Unauthorized Access")]
    InvalidToken,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Drops client-supplied identity headers on every request.
#[derive(Clone, Debug, Default)]
pub struct StripIdentityHeaders;

impl Stage for StripIdentityHeaders {
    fn name(&self) -> &'static str {
        "strip_identity_headers"
    }

    fn apply(&self, mut request: Request) -> Flow {
        identity::strip(request.headers_mut());
        Flow::Continue(request)
    }
}

/// Verifies the bearer token on secured routes and injects identity headers.
#[derive(Clone, Debug)]
pub struct Authenticate {
    classifier: RouteClassifier,
    codec: TokenCodec,
}

impl Authenticate {
    #[must_use]
    pub fn new(classifier: RouteClassifier, codec: TokenCodec) -> Self {
        Self { classifier, codec }
    }

    /// # Errors
    /// Returns [`GatewayError`] when the header is absent or the token is not
    /// valid right now.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, GatewayError> {
        self.authenticate_at(headers, now_unix_seconds())
    }

    /// # Errors
    /// See [`Authenticate::authenticate`].
    pub fn authenticate_at(&self, headers: &HeaderMap, now: i64) -> Result<Claims, GatewayError> {
        let token = bearer_token(headers).ok_or(GatewayError::MissingAuthHeader)?;

        self.codec.verify_fresh(token, now).map_err(|err| {
            match &err {
                TokenError::InvalidSignature => warn!("rejected token with invalid signature"),
                TokenError::Expired => debug!("rejected expired token"),
                _ => debug!("rejected token: {err}"),
            }
            GatewayError::InvalidToken
        })
    }
}

impl Stage for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn apply(&self, mut request: Request) -> Flow {
        if !self
            .classifier
            .is_secured(request.method(), request.uri().path())
        {
            return Flow::Continue(request);
        }

        match self.authenticate(request.headers()) {
            Ok(claims) => {
                identity::inject(request.headers_mut(), &claims);
                Flow::Continue(request)
            }
            Err(err) => Flow::Respond(err.into_response()),
        }
    }
}

/// `Authorization: Bearer <token>`, scheme matched case-insensitively.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
