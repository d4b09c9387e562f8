//! Perimeter gateway: authenticate, attach identity, reverse-proxy.
//!
//! Every request runs through [`Pipeline`] (strip spoofed identity headers,
//! then authenticate secured routes) before reaching the proxy fallback.

pub mod auth;
pub mod identity;
pub mod pipeline;
pub mod proxy;
pub mod routes;

pub use auth::{Authenticate, GatewayError, StripIdentityHeaders};
pub use identity::GatewayIdentity;
pub use pipeline::{Flow, Pipeline, Stage};
pub use proxy::{Proxy, Upstream, Upstreams};
pub use routes::{RouteClassifier, RoutePattern};

use anyhow::Result;
use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use std::sync::Arc;
use tracing::info;

use crate::{api::handlers::health, http, token::TokenCodec};

/// Default pipeline: strip identity headers, then authenticate.
#[must_use]
pub fn default_pipeline(classifier: RouteClassifier, codec: TokenCodec) -> Pipeline {
    Pipeline::new()
        .with_stage(StripIdentityHeaders)
        .with_stage(Authenticate::new(classifier, codec))
}

#[must_use]
pub fn router(pipeline: Pipeline, proxy: Proxy) -> Router {
    let app = Router::new()
        .route("/health", get(health::health))
        .fallback(proxy::forward)
        .with_state(Arc::new(proxy))
        .layer(DefaultBodyLimit::max(proxy::MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            Arc::new(pipeline),
            pipeline::enforce,
        ));

    http::with_common_layers(app)
}

/// Start the gateway.
///
/// # Errors
/// Returns an error if the HTTP client cannot be built or the server fails.
pub async fn new(
    port: u16,
    classifier: RouteClassifier,
    codec: TokenCodec,
    upstreams: Upstreams,
) -> Result<()> {
    for upstream in upstreams.routes() {
        info!(prefix = upstream.prefix(), base = %upstream.base(), "upstream");
    }
    for pattern in classifier.open_routes() {
        info!(route = %pattern, "open route");
    }

    let proxy = Proxy::new(upstreams)?;
    let app = router(default_pipeline(classifier, codec), proxy);

    http::serve(port, app).await
}
