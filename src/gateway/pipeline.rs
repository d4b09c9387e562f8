//! Ordered request stages run in front of the proxy.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// What a stage decided for the request.
pub enum Flow {
    Continue(Request),
    Respond(Response),
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, request: Request) -> Flow;
}

#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run stages in order, stopping at the first one that responds.
    pub fn run(&self, mut request: Request) -> Flow {
        for stage in &self.stages {
            match stage.apply(request) {
                Flow::Continue(next) => request = next,
                Flow::Respond(response) => {
                    debug!(stage = stage.name(), "request short-circuited");
                    return Flow::Respond(response);
                }
            }
        }
        Flow::Continue(request)
    }
}

/// Axum middleware running the pipeline before the inner service.
pub async fn enforce(State(pipeline): State<Arc<Pipeline>>, request: Request, next: Next) -> Response {
    match pipeline.run(request) {
        Flow::Continue(request) => next.run(request).await,
        Flow::Respond(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, response::IntoResponse};

    struct Tag(&'static str);

    impl Stage for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        fn apply(&self, mut request: Request) -> Flow {
            let seen = request
                .headers()
                .get("x-stages")
                .and_then(|v| v.to_str().ok())
                .map_or_else(|| self.0.to_string(), |v| format!("{v},{}", self.0));
            if let Ok(value) = seen.parse() {
                request.headers_mut().insert("x-stages", value);
            }
            Flow::Continue(request)
        }
    }

    struct Deny;

    impl Stage for Deny {
        fn name(&self) -> &'static str {
            "deny"
        }

        fn apply(&self, _request: Request) -> Flow {
            Flow::Respond(StatusCode::FORBIDDEN.into_response())
        }
    }

    #[test]
    fn stages_run_in_order() {
        let pipeline = Pipeline::new().with_stage(Tag("a")).with_stage(Tag("b"));
        assert_eq!(pipeline.stage_names(), vec!["a", "b"]);

        let request = Request::builder().uri("/").body(Body::empty()).expect("request");
        match pipeline.run(request) {
            Flow::Continue(request) => assert_eq!(
                request.headers().get("x-stages").and_then(|v| v.to_str().ok()),
                Some("a,b")
            ),
            Flow::Respond(_) => panic!("expected request to continue"),
        }
    }

    #[test]
    fn responding_stage_stops_the_pipeline() {
        let pipeline = Pipeline::new()
            .with_stage(Deny)
            .with_stage(Tag("never"));

        let request = Request::builder().uri("/").body(Body::empty()).expect("request");
        match pipeline.run(request) {
            Flow::Respond(response) => assert_eq!(response.status(), StatusCode::FORBIDDEN),
            Flow::Continue(_) => panic!("expected a response"),
        }
    }
}
