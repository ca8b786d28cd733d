//! Request/response values and the handler capability.
//!
//! # JSF Compliance (Rule 206)
//!
//! Headers, cookies and parameters use `SmallVec` storage so the common case
//! (few headers, few params) does not touch the heap.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::di::ResolvedDependencies;
use crate::error::{DispatchError, ErrorEnvelope};
use crate::ids::RequestId;

/// Maximum inline headers/cookies before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Maximum inline path/query parameters before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated header/cookie storage; names are `Arc<str>` so repeated
/// names clone in O(1).
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Stack-allocated path/query parameter storage.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Request data as decoded by the transport.
///
/// `params` starts empty and is filled by the dispatcher with the extracted,
/// coerced and validated values described by the route's parameter schema.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub body: Option<Value>,
    /// Validated parameters keyed by schema property name
    pub params: Map<String, Value>,
    /// Path template of the matched route, once matched
    pub route_pattern: Option<Arc<str>>,
}

impl DispatchRequest {
    /// Build a request; a query string in `path` is split off and decoded.
    pub fn new(method: Method, path: &str) -> Self {
        let (path_only, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };
        let query_params = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            request_id: RequestId::new(),
            method,
            path: if path_only.is_empty() { "/".to_string() } else { path_only.to_string() },
            path_params: ParamVec::new(),
            query_params,
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            body: None,
            params: Map::new(),
            route_pattern: None,
        }
    }

    /// Add a header. A `cookie` header is also split into cookies and an
    /// `x-request-id` header that parses as a ULID becomes the request id.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if name.eq_ignore_ascii_case("cookie") {
            for (k, v) in parse_cookie_header(&value) {
                self.cookies.push((Arc::from(k), v.to_string()));
            }
        }
        if let Some(id) = RequestId::from_header(name, &value) {
            self.request_id = id;
        }
        self.headers.push((Arc::from(name), value));
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: &str, value: impl Into<String>) -> Self {
        self.cookies.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_query_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query_params.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, id: RequestId) -> Self {
        self.request_id = id;
        self
    }

    /// Get a path parameter by name (last write wins)
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name (last write wins)
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Validated parameter value
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Note: allocates
    #[must_use]
    pub fn headers_map(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect()
    }
}

fn parse_cookie_header(raw: &str) -> impl Iterator<Item = (&str, &str)> {
    raw.split(';').filter_map(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        let name = parts.next()?.trim();
        if name.is_empty() {
            return None;
        }
        Some((name, parts.next().unwrap_or("").trim()))
    })
}

/// Response produced by a handler, a hook, or the error path.
///
/// When the response was produced from an error, `envelope` holds the
/// structured error so transports and tests can inspect the code without
/// parsing the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
    #[serde(skip)]
    pub envelope: Option<ErrorEnvelope>,
}

impl DispatchResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
            envelope: None,
        }
    }

    /// JSON response with a `content-type` header
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self::new(status, headers, body)
    }

    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    /// Plain status with no body
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), Value::Null)
    }

    /// Response carrying a structured error
    #[must_use]
    pub fn from_envelope(envelope: ErrorEnvelope) -> Self {
        let mut resp = Self::json(envelope.status(), envelope.to_http_body());
        resp.envelope = Some(envelope);
        resp
    }

    /// `handler_error` response with an explicit status
    #[must_use]
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::from_envelope(DispatchError::handler(status, message).to_envelope())
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive)
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.envelope.is_some()
    }

    #[must_use]
    pub fn envelope(&self) -> Option<&ErrorEnvelope> {
        self.envelope.as_ref()
    }
}

/// A request handler: a capability with an optional guard and a body.
///
/// `matches` lets one handler decline a request that its route matched
/// (the dispatcher then answers `route_not_found`).
pub trait Handler: Send + Sync {
    fn matches(&self, _req: &DispatchRequest) -> bool {
        true
    }

    fn handle(
        &self,
        req: &DispatchRequest,
        deps: &ResolvedDependencies,
    ) -> Result<DispatchResponse, DispatchError>;
}

struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&DispatchRequest, &ResolvedDependencies) -> Result<DispatchResponse, DispatchError>
        + Send
        + Sync,
{
    fn handle(
        &self,
        req: &DispatchRequest,
        deps: &ResolvedDependencies,
    ) -> Result<DispatchResponse, DispatchError> {
        (self.0)(req, deps)
    }
}

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&DispatchRequest, &ResolvedDependencies) -> Result<DispatchResponse, DispatchError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHandler(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_string_is_split_and_decoded() {
        let req = DispatchRequest::new(Method::GET, "/search?q=a%20b&limit=10&limit=20");
        assert_eq!(req.path, "/search");
        assert_eq!(req.get_query_param("q"), Some("a b"));
        assert_eq!(req.get_query_param("limit"), Some("20"));
    }

    #[test]
    fn cookie_header_populates_cookies() {
        let req = DispatchRequest::new(Method::GET, "/").with_header("Cookie", "a=b; c=d");
        assert_eq!(req.get_cookie("a"), Some("b"));
        assert_eq!(req.get_cookie("c"), Some("d"));
        assert_eq!(req.get_header("cookie"), Some("a=b; c=d"));
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut resp = DispatchResponse::ok(json!({}));
        resp.set_header("Content-Type", "text/plain");
        assert_eq!(resp.headers.len(), 1);
        assert_eq!(resp.get_header("content-type"), Some("text/plain"));
    }
}
