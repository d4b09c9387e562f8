//! Account service HTTP API.

pub mod handlers;

use anyhow::Result;
use axum::{
    extract::Extension,
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    accounts::{spawn_purge_worker, AccountLifecycle},
    http,
};
use handlers::{health, profile, signin, signup, token_info, types, verify};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        signup::signup,
        signin::signin,
        verify::verify,
        token_info::token_info,
        profile::profile,
    ),
    components(schemas(
        health::Health,
        types::SignupRequest,
        types::SigninRequest,
        types::SigninResponse,
        types::ErrorResponse,
        types::TokenInfo,
        types::AccountProfile,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Signup, email verification and signin"),
        (name = "health", description = "Liveness"),
        (name = "diagnostics", description = "Token and identity inspection"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[must_use]
pub fn router(lifecycle: AccountLifecycle) -> Router {
    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        // allow requests from any origin
        .allow_origin(Any);

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/auth/signup", post(signup::signup))
        .route("/auth/signin", post(signin::signin))
        .route("/auth/verify", get(verify::verify))
        .route("/test", get(profile::profile))
        .route("/test/token-info", get(token_info::token_info))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(cors)
        .layer(Extension(lifecycle));

    http::with_common_layers(app)
}

/// Start the account service.
///
/// # Errors
/// Returns an error if the server fails to start.
pub async fn new(port: u16, lifecycle: AccountLifecycle, purge_every: std::time::Duration) -> Result<()> {
    let purge = spawn_purge_worker(lifecycle.store(), purge_every);
    if purge.is_some() {
        info!(every = ?purge_every, "verification token purge scheduled");
    }

    let result = http::serve(port, router(lifecycle)).await;

    if let Some(handle) = purge {
        handle.abort();
    }
    result
}
