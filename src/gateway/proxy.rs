//! Reverse proxy to the upstream owning the longest matching path prefix.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{
        rejection::{BytesRejection, FailedToBufferBody},
        FromRequest, Request, State,
    },
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, error, instrument};
use url::Url;

use crate::APP_USER_AGENT;

/// Largest request body buffered before forwarding.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upstream {
    prefix: String,
    base: Url,
}

impl Upstream {
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return true;
        }
        path == self.prefix
            || path
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Upstream base joined with the inbound path and query.
    #[must_use]
    pub fn target(&self, path_and_query: &str) -> String {
        format!(
            "{}{}",
            self.base.as_str().trim_end_matches('/'),
            path_and_query
        )
    }
}

impl FromStr for Upstream {
    type Err = anyhow::Error;

    /// `"/prefix=http://host:port"`
    fn from_str(value: &str) -> Result<Self> {
        let (prefix, url) = value
            .split_once('=')
            .ok_or_else(|| anyhow!("upstream must be prefix=url, got: {value}"))?;

        let prefix = prefix.trim();
        if !prefix.starts_with('/') {
            return Err(anyhow!("upstream prefix must start with '/': {value}"));
        }
        let prefix = match prefix.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };

        let base = Url::parse(url.trim()).with_context(|| format!("invalid upstream URL: {url}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!("upstream URL must be http or https: {url}"));
        }

        Ok(Self { prefix, base })
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.prefix, self.base)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Upstreams {
    routes: Vec<Upstream>,
}

impl Upstreams {
    /// # Errors
    /// Returns an error for the first entry that is not `prefix=url`.
    pub fn parse<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let routes = entries
            .into_iter()
            .map(|entry| entry.as_ref().parse())
            .collect::<Result<Vec<Upstream>>>()?;
        Ok(Self { routes })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    #[must_use]
    pub fn routes(&self) -> &[Upstream] {
        &self.routes
    }

    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Upstream> {
        self.routes
            .iter()
            .filter(|upstream| upstream.matches(path))
            .max_by_key(|upstream| upstream.prefix.len())
    }
}

pub struct Proxy {
    upstreams: Upstreams,
    client: reqwest::Client,
}

impl Proxy {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(upstreams: Upstreams) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self { upstreams, client })
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Copy headers minus hop-by-hop ones and anything named by `Connection`.
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    let mut out = headers.clone();
    for name in HOP_BY_HOP.iter().chain(listed.iter()) {
        out.remove(name);
    }
    out
}

#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn forward(State(proxy): State<Arc<Proxy>>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let Some(upstream) = proxy.upstreams.resolve(&path) else {
        debug!("no upstream for path");
        return json_error(StatusCode::NOT_FOUND, "No route");
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map_or_else(|| path.clone(), |pq| pq.as_str().to_string());
    let target = upstream.target(&path_and_query);

    let method = request.method().clone();
    let mut headers = forwardable_headers(request.headers());
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    // Limit comes from the DefaultBodyLimit layer installed by the gateway router.
    let body = match Bytes::from_request(request, &()).await {
        Ok(body) => body,
        Err(BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_))) => {
            debug!("request body over {MAX_BODY_BYTES} bytes");
            return json_error(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
        }
        Err(rejection) => {
            debug!("failed to read request body: {rejection}");
            return json_error(StatusCode::BAD_REQUEST, "Bad Request");
        }
    };

    let upstream_response = match proxy
        .client
        .request(method, &target)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            error!(upstream = %upstream.base(), "upstream request failed: {err}");
            return json_error(StatusCode::BAD_GATEWAY, "Bad Gateway");
        }
    };

    let status = upstream_response.status();
    let mut response_headers = forwardable_headers(upstream_response.headers());
    response_headers.remove(header::CONTENT_LENGTH);

    let bytes = match upstream_response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(upstream = %upstream.base(), "failed to read upstream response: {err}");
            return json_error(StatusCode::BAD_GATEWAY, "Bad Gateway");
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn resolve_prefers_longest_prefix() -> Result<()> {
        let upstreams = Upstreams::parse([
            "/=http://default:9000",
            "/auth=http://auth:8081",
            "/auth/admin/=http://admin:8082",
        ])?;

        let prefix = |path: &str| upstreams.resolve(path).map(|u| u.prefix().to_string());
        assert_eq!(prefix("/auth/signin"), Some("/auth".to_string()));
        assert_eq!(prefix("/auth"), Some("/auth".to_string()));
        assert_eq!(prefix("/auth/admin/users"), Some("/auth/admin".to_string()));
        assert_eq!(prefix("/authority"), Some("/".to_string()));
        assert_eq!(prefix("/products/1"), Some("/".to_string()));
        Ok(())
    }

    #[test]
    fn resolve_without_match() -> Result<()> {
        let upstreams = Upstreams::parse(["/auth=http://auth:8081"])?;
        assert!(upstreams.resolve("/products").is_none());
        assert!(Upstreams::default().is_empty());
        Ok(())
    }

    #[test]
    fn upstream_parsing_errors() {
        assert!("auth=http://auth".parse::<Upstream>().is_err());
        assert!("/auth".parse::<Upstream>().is_err());
        assert!("/auth=not a url".parse::<Upstream>().is_err());
        assert!("/auth=ftp://auth".parse::<Upstream>().is_err());
    }

    #[test]
    fn target_keeps_path_and_query() -> Result<()> {
        let upstream: Upstream = "/auth=http://auth:8081/".parse()?;
        assert_eq!(
            upstream.target("/auth/verify?token=abc"),
            "http://auth:8081/auth/verify?token=abc"
        );
        assert_eq!(upstream.to_string(), "/auth=http://auth:8081/");
        Ok(())
    }

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-secret-hop"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-secret-hop", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let out = forwardable_headers(&headers);
        assert!(out.get(header::CONNECTION).is_none());
        assert!(out.get("keep-alive").is_none());
        assert!(out.get("x-secret-hop").is_none());
        assert!(out.get(header::TRANSFER_ENCODING).is_none());
        assert!(out.get(header::AUTHORIZATION).is_some());
        assert!(out.get(header::ACCEPT).is_some());
    }
}
