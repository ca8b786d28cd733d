//! Router core module - hot path for request routing.
//!
//! # JSF Compliance (Rule 206)
//!
//! This module is part of the request hot path. Path parameters are collected
//! into a `SmallVec` so matching a route with few parameters does not
//! allocate a vector.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::debug;

use crate::dispatcher::{Handler, ParamVec};
use crate::error::DispatchError;
use crate::schema::{path_segments, PathSegment};

use super::registry::{HandlerRef, RouteDescriptor, RouteRegistry};

/// Result of successfully matching a request to a route
#[derive(Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteDescriptor>,
    pub handler: Arc<dyn Handler>,
    /// Path parameters extracted from the URL (e.g., `{id}` → `{"id": "123"}`)
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Get a path parameter by name
    ///
    /// Uses "last write wins" semantics: if duplicate parameter names exist
    /// at different path depths, returns the last occurrence.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("route", &self.route.label())
            .field("path_params", &self.path_params)
            .finish()
    }
}

struct CompiledRoute {
    method: Method,
    regex: Regex,
    /// Names as `Arc<str>` so per-request extraction clones in O(1)
    param_names: Vec<Arc<str>>,
    route: Arc<RouteDescriptor>,
    handler: Arc<dyn Handler>,
}

/// Route table frozen for matching, with every handler resolved.
pub struct CompiledRoutes {
    routes: Vec<CompiledRoute>,
}

impl CompiledRoutes {
    /// Compile `registry`, resolving named handlers against `handlers`.
    ///
    /// A named handler missing from the table fails with
    /// `handler_not_callable`.
    pub fn compile(
        registry: &RouteRegistry,
        handlers: &HashMap<String, Arc<dyn Handler>>,
    ) -> Result<Self, DispatchError> {
        let mut routes = Vec::with_capacity(registry.len());
        for route in registry.snapshot() {
            let handler = match &route.handler {
                HandlerRef::Inline(h) => Arc::clone(h),
                HandlerRef::Named(name) => handlers.get(name).map(Arc::clone).ok_or_else(|| {
                    DispatchError::HandlerNotCallable {
                        handler: name.clone(),
                        route: route.label(),
                    }
                })?,
            };
            let (regex, names) = path_to_regex(&route.path)?;
            routes.push(CompiledRoute {
                method: route.method.clone(),
                regex,
                param_names: names.into_iter().map(Arc::from).collect(),
                route,
                handler,
            });
        }
        registry.log_summary();
        Ok(Self { routes })
    }

    /// Find the first route, in registration order, matching `method path`.
    ///
    /// A query string on `path` is ignored.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let path = path.split('?').next().unwrap_or(path);
        for compiled in &self.routes {
            if compiled.method != *method {
                continue;
            }
            if let Some(caps) = compiled.regex.captures(path) {
                let mut path_params = ParamVec::new();
                for (i, name) in compiled.param_names.iter().enumerate() {
                    if let Some(m) = caps.get(i + 1) {
                        path_params.push((Arc::clone(name), decode_segment(m.as_str())));
                    }
                }
                debug!(
                    method = %method,
                    path = %path,
                    route = %compiled.route.path,
                    "Route matched"
                );
                return Some(RouteMatch {
                    route: Arc::clone(&compiled.route),
                    handler: Arc::clone(&compiled.handler),
                    path_params,
                });
            }
        }
        debug!(method = %method, path = %path, "No route matched");
        None
    }

    /// Whether any route accepts `path` under a different method
    #[must_use]
    pub fn path_exists(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        self.routes.iter().any(|r| r.regex.is_match(path))
    }

    #[must_use]
    pub fn routes(&self) -> Vec<Arc<RouteDescriptor>> {
        self.routes.iter().map(|r| Arc::clone(&r.route)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for CompiledRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| r.route.label()))
            .finish()
    }
}

/// Percent-decode a captured path value. `+` is kept literally, and invalid
/// UTF-8 sequences are replaced rather than rejected.
fn decode_segment(raw: &str) -> String {
    if raw.contains('%') {
        percent_decode_str(raw).decode_utf8_lossy().into_owned()
    } else {
        raw.to_string()
    }
}

/// Convert a path template into an anchored regex and its parameter names.
///
/// Segments are classified by [`PathSegment::parse`]. Supported placeholder
/// forms, one per segment:
///
/// - `{id}` and `{id:int}` match one segment
/// - `{rest:path}` matches the remainder of the path, slashes included
/// - `:id` matches one segment
///
/// Literal segments are regex-escaped.
pub(crate) fn path_to_regex(path: &str) -> Result<(Regex, Vec<String>), DispatchError> {
    if path == "/" {
        let regex = Regex::new(r"^/$")
            .map_err(|e| DispatchError::invalid_argument(format!("invalid route path: {e}")))?;
        return Ok((regex, Vec::new()));
    }

    let mut pattern = String::with_capacity(path.len() + 8);
    pattern.push('^');
    let mut param_names = Vec::with_capacity(path.matches(['{', ':']).count());

    for segment in path_segments(path) {
        match segment {
            PathSegment::Param { name, converter } => {
                if converter == Some("path") {
                    pattern.push_str("/(.+)");
                } else {
                    pattern.push_str("/([^/]+)");
                }
                param_names.push(name.to_string());
            }
            PathSegment::Literal(literal) => {
                pattern.push('/');
                pattern.push_str(&regex::escape(literal));
            }
        }
    }

    if path.ends_with('/') {
        pattern.push('/');
    }
    pattern.push('$');

    let regex = Regex::new(&pattern).map_err(|e| {
        DispatchError::invalid_argument(format!("invalid route path \"{path}\": {e}"))
    })?;
    Ok((regex, param_names))
}
