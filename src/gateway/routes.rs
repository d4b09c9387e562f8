//! Which inbound paths bypass authentication.

use axum::http::Method;
use std::fmt;
use std::str::FromStr;

/// Paths reachable without a bearer token unless configured otherwise.
pub const DEFAULT_OPEN_ROUTES: &[&str] = &["/auth/signup", "/auth/signin", "/auth/verify", "GET /health"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePattern {
    method: Option<Method>,
    path: String,
    prefix: bool,
}

impl RoutePattern {
    fn matches(&self, method: &Method, path: &str) -> bool {
        if self.method.as_ref().is_some_and(|m| m != method) {
            return false;
        }

        let path = trim_trailing_slash(path);
        if self.prefix {
            if self.path.is_empty() {
                return true;
            }
            path == self.path
                || path
                    .strip_prefix(self.path.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        } else {
            path == self.path
        }
    }
}

impl FromStr for RoutePattern {
    type Err = String;

    /// `"/path"`, `"/prefix/*"` or either preceded by a method, e.g. `"GET /health"`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (method, path) = match value.split_once(char::is_whitespace) {
            Some((method, path)) => {
                let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .map_err(|_| format!("invalid method in route pattern: {value}"))?;
                (Some(method), path.trim())
            }
            None => (None, value),
        };

        if !path.starts_with('/') {
            return Err(format!("route pattern must start with '/': {value}"));
        }

        let (path, prefix) = match path.strip_suffix("/*") {
            Some(base) => (base, true),
            None => (path, false),
        };

        Ok(Self {
            method,
            path: trim_trailing_slash(path).to_string(),
            prefix,
        })
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(method) = &self.method {
            write!(f, "{method} ")?;
        }
        if self.prefix {
            write!(f, "{}/*", self.path)
        } else if self.path.is_empty() {
            f.write_str("/")
        } else {
            f.write_str(&self.path)
        }
    }
}

fn trim_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        ""
    } else {
        trimmed
    }
}

/// Allow-list of routes that skip authentication. Pure and cheap to share.
#[derive(Clone, Debug)]
pub struct RouteClassifier {
    open: Vec<RoutePattern>,
}

impl RouteClassifier {
    #[must_use]
    pub fn new(open: Vec<RoutePattern>) -> Self {
        Self { open }
    }

    /// Parse a list of patterns.
    ///
    /// # Errors
    /// Returns the first pattern that fails to parse.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let open = patterns
            .into_iter()
            .map(|p| p.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { open })
    }

    #[must_use]
    pub fn open_routes(&self) -> &[RoutePattern] {
        &self.open
    }

    #[must_use]
    pub fn is_secured(&self, method: &Method, path: &str) -> bool {
        !self.open.iter().any(|pattern| pattern.matches(method, path))
    }
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self {
            open: DEFAULT_OPEN_ROUTES
                .iter()
                .filter_map(|p| p.parse().ok())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_open_routes() {
        let classifier = RouteClassifier::default();
        assert_eq!(classifier.open_routes().len(), DEFAULT_OPEN_ROUTES.len());

        assert!(!classifier.is_secured(&Method::POST, "/auth/signup"));
        assert!(!classifier.is_secured(&Method::POST, "/auth/signin"));
        assert!(!classifier.is_secured(&Method::GET, "/auth/verify"));
        assert!(!classifier.is_secured(&Method::GET, "/health"));
        assert!(!classifier.is_secured(&Method::GET, "/health/"));

        assert!(classifier.is_secured(&Method::POST, "/health"));
        assert!(classifier.is_secured(&Method::GET, "/test"));
        assert!(classifier.is_secured(&Method::GET, "/auth/signup/extra"));
        assert!(classifier.is_secured(&Method::GET, "/products"));
    }

    #[test]
    fn prefix_patterns_match_subtree_only() -> Result<(), String> {
        let classifier = RouteClassifier::from_patterns(["/public/*"])?;
        assert!(!classifier.is_secured(&Method::GET, "/public"));
        assert!(!classifier.is_secured(&Method::GET, "/public/logo.png"));
        assert!(!classifier.is_secured(&Method::DELETE, "/public/a/b"));
        assert!(classifier.is_secured(&Method::GET, "/publicity"));
        Ok(())
    }

    #[test]
    fn root_wildcard_opens_everything() -> Result<(), String> {
        let classifier = RouteClassifier::from_patterns(["/*"])?;
        assert!(!classifier.is_secured(&Method::GET, "/"));
        assert!(!classifier.is_secured(&Method::PUT, "/anything/at/all"));
        Ok(())
    }

    #[test]
    fn pattern_parsing() {
        assert_eq!(
            "get /health".parse::<RoutePattern>().map(|p| p.to_string()),
            Ok("GET /health".to_string())
        );
        assert_eq!(
            "/docs/*".parse::<RoutePattern>().map(|p| p.to_string()),
            Ok("/docs/*".to_string())
        );
        assert!("health".parse::<RoutePattern>().is_err());
        assert!("G@T /health".parse::<RoutePattern>().is_err());
    }

    #[test]
    fn empty_list_secures_everything() {
        let classifier = RouteClassifier::new(Vec::new());
        assert!(classifier.is_secured(&Method::POST, "/auth/signup"));
    }
}
