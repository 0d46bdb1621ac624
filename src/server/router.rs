//! Ordered pattern router
//!
//! Rules are `(pattern, handler)` pairs evaluated in declaration order; the
//! first rule whose pattern matches the request wins. There is no "most
//! specific match" resolution, so specific patterns must be declared before
//! general ones.
//!
//! A pattern is written `METHOD:/segment/segment`. Each segment is one of:
//!
//! - a literal (`hightech`, `pull`), compared exactly
//! - `{date}`: a fixed-width `NNNN-NN-NN` run of digits and dashes
//! - `{token}`: an alphanumeric character followed by alphanumerics or `-`
//!
//! Patterns are parsed when the router is built; a malformed pattern is a
//! configuration error and the server never starts.

use crate::core::error::{HightechError, Result};
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Method, Request};
use axum::response::Response;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Per-request identifier, available in request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Values captured by `{date}`/`{token}` segments, in pattern order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(pub Vec<String>);

impl RouteParams {
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }
}

/// A request handler
///
/// Handlers own the whole response: status, headers and body.
pub trait Handler: Send + Sync {
    fn call(&self, req: Request<Body>) -> BoxFuture<'static, Response>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request<Body>) -> BoxFuture<'static, Response> {
        Box::pin((self)(req))
    }
}

/// One segment of a route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Date,
    Token,
}

impl Segment {
    fn parse(raw: &str, pattern: &str) -> Result<Self> {
        match raw {
            "{date}" => Ok(Segment::Date),
            "{token}" => Ok(Segment::Token),
            _ if !raw.is_empty()
                && raw
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) =>
            {
                Ok(Segment::Literal(raw.to_string()))
            }
            _ => Err(HightechError::configuration(format!(
                "route '{}' has an invalid segment '{}'",
                pattern, raw
            ))),
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Segment::Literal(literal) => literal == value,
            Segment::Date => is_date_shaped(value),
            Segment::Token => is_token(value),
        }
    }
}

fn is_date_shaped(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

fn is_token(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// A parsed `METHOD:/path` pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    method: Method,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern; trailing separators are ignored
    pub fn parse(pattern: &str) -> Result<Self> {
        let (method, path) = pattern.split_once(':').ok_or_else(|| {
            HightechError::configuration(format!("route '{}' has no METHOD: prefix", pattern))
        })?;

        if method.is_empty() || !method.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(HightechError::configuration(format!(
                "route '{}' has an invalid method",
                pattern
            )));
        }
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| HightechError::configuration(format!("route '{}': {}", pattern, e)))?;

        let Some(path) = path.strip_prefix('/') else {
            return Err(HightechError::configuration(format!(
                "route '{}' path must start with '/'",
                pattern
            )));
        };

        let segments = split_path(path.trim_end_matches('/'))
            .map(|raw| Segment::parse(raw, pattern))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { method, segments })
    }

    /// Match a normalized path, returning the captured placeholder values
    pub fn matches(&self, method: &Method, path: &str) -> Option<RouteParams> {
        if *method != self.method {
            return None;
        }

        let mut params = Vec::new();
        let mut parts = split_path(path);
        for segment in &self.segments {
            let part = parts.next()?;
            if !segment.matches(part) {
                return None;
            }
            if !matches!(segment, Segment::Literal(_)) {
                params.push(part.to_string());
            }
        }

        // anchored at the end too
        parts.next().is_none().then_some(RouteParams(params))
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(move |_| !path.is_empty())
}

/// Strip leading and trailing separators from a request path
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches('/')
}

struct Rule {
    source: String,
    pattern: RoutePattern,
    handler: Arc<dyn Handler>,
}

/// Builder collecting rules in declaration order
pub struct PatternRouterBuilder {
    header: String,
    rules: Vec<(String, Arc<dyn Handler>)>,
    fallback: Option<Arc<dyn Handler>>,
}

impl PatternRouterBuilder {
    /// Append a rule
    pub fn route(mut self, pattern: &str, handler: impl Handler + 'static) -> Self {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        self.rules.push((pattern.to_string(), handler));
        self
    }

    /// Handler for requests no rule matches
    pub fn fallback(mut self, handler: impl Handler + 'static) -> Self {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        self.fallback = Some(handler);
        self
    }

    /// Parse every pattern; any malformed one fails the whole build
    pub fn build(self) -> Result<PatternRouter> {
        let header = HeaderName::from_bytes(self.header.as_bytes()).map_err(|e| {
            HightechError::configuration(format!("invalid request id header '{}': {}", self.header, e))
        })?;

        let rules = self
            .rules
            .into_iter()
            .map(|(source, handler)| {
                Ok(Rule {
                    pattern: RoutePattern::parse(&source)?,
                    source,
                    handler,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let fallback: Arc<dyn Handler> = match self.fallback {
            Some(handler) => handler,
            None => Arc::new(default_not_found),
        };

        Ok(PatternRouter {
            header,
            rules,
            fallback,
        })
    }
}

async fn default_not_found(_req: Request<Body>) -> Response {
    let mut response = Response::new(Body::from("Not Found"));
    *response.status_mut() = axum::http::StatusCode::NOT_FOUND;
    response
}

/// Dispatches each request to exactly one handler
pub struct PatternRouter {
    header: HeaderName,
    rules: Vec<Rule>,
    fallback: Arc<dyn Handler>,
}

impl PatternRouter {
    /// Start building a router whose request ids go in `header`
    pub fn builder(header: impl Into<String>) -> PatternRouterBuilder {
        PatternRouterBuilder {
            header: header.into(),
            rules: Vec::new(),
            fallback: None,
        }
    }

    /// Patterns in evaluation order, as declared
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.source.as_str())
    }

    /// Route one request
    ///
    /// A fresh request id is stored in the request extensions before the
    /// handler runs and copied onto the response header afterwards. The
    /// router owns that header: a value set by the handler is replaced.
    pub async fn dispatch(&self, mut req: Request<Body>) -> Response {
        let request_id = RequestId(Uuid::new_v4());
        let method = req.method().clone();
        let path = normalize_path(req.uri().path()).to_string();
        let key = format!("{}:/{}", method, path);

        tracing::info!(request_id = %request_id, key = %key, "incoming");
        req.extensions_mut().insert(request_id);

        let matched = self
            .rules
            .iter()
            .find_map(|rule| rule.pattern.matches(&method, &path).map(|p| (rule, p)));

        let mut response = match matched {
            Some((rule, params)) => {
                tracing::debug!(request_id = %request_id, rule = %rule.source, "matched");
                req.extensions_mut().insert(params);
                rule.handler.call(req).await
            }
            None => {
                tracing::debug!(request_id = %request_id, "no rule matched");
                self.fallback.call(req).await
            }
        };

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(self.header.clone(), value);
        }
        response
    }

    /// Expose the router as an axum service
    ///
    /// Every request, whatever its path, goes through [`dispatch`](Self::dispatch).
    pub fn into_axum(self) -> axum::Router {
        let router = Arc::new(self);
        axum::Router::new().fallback(move |req: Request<Body>| {
            let router = router.clone();
            async move { router.dispatch(req).await }
        })
    }
}
