use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::dispatcher::{handler_fn, DispatchRequest, DispatchResponse, Handler};
use crate::di::ResolvedDependencies;
use crate::error::DispatchError;
use crate::runtime_config::{DuplicatePolicy, RuntimeConfig};
use crate::schema::{infer_parameter_schema, infer_request_schema, merge_parameter_schema, ParamSpec, RpcMethodInfo};

/// How a route refers to its handler.
#[derive(Clone)]
pub enum HandlerRef {
    /// Handler object supplied with the route
    Inline(Arc<dyn Handler>),
    /// Name looked up in the dispatcher's handler table at build time
    Named(String),
}

impl HandlerRef {
    pub fn inline<H: Handler + 'static>(handler: H) -> Self {
        HandlerRef::Inline(Arc::new(handler))
    }

    pub fn named(name: impl Into<String>) -> Self {
        HandlerRef::Named(name.into())
    }

    /// Name used in logs and schema payloads
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            HandlerRef::Inline(_) => "<inline>",
            HandlerRef::Named(name) => name,
        }
    }
}

impl From<Arc<dyn Handler>> for HandlerRef {
    fn from(handler: Arc<dyn Handler>) -> Self {
        HandlerRef::Inline(handler)
    }
}

impl From<&str> for HandlerRef {
    fn from(name: &str) -> Self {
        HandlerRef::Named(name.to_string())
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Inline(_) => f.write_str("Inline(..)"),
            HandlerRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

/// Parse an HTTP method case-insensitively into its canonical upper-case form.
pub fn normalize_method(method: &str) -> Result<Method, DispatchError> {
    let upper = method.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(DispatchError::invalid_argument("route method must not be empty"));
    }
    Method::from_bytes(upper.as_bytes())
        .map_err(|_| DispatchError::invalid_argument(format!("invalid HTTP method \"{method}\"")))
}

/// Strip the query string and make sure the path is rooted.
pub fn normalize_path(path: &str) -> Result<String, DispatchError> {
    let path = path.split('?').next().unwrap_or_default().trim();
    if path.is_empty() {
        return Err(DispatchError::invalid_argument("route path must not be empty"));
    }
    if path.starts_with('/') {
        Ok(path.to_string())
    } else {
        Ok(format!("/{path}"))
    }
}

/// One registered route.
///
/// Descriptors are frozen once registered: the registry stores them behind
/// `Arc` and hands out shared snapshots.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    /// Upper-case HTTP method
    pub method: Method,
    /// Path template without query string (`/users/{id}`)
    pub path: String,
    pub handler: HandlerRef,
    pub request_schema: Option<Value>,
    pub response_schema: Option<Value>,
    /// Composite schema for path/query/header/cookie inputs; after
    /// registration this holds the merge of the inferred and explicit schemas
    pub parameter_schema: Option<Value>,
    pub params: Vec<ParamSpec>,
    /// Dependency names resolved for each request
    pub dependencies: Vec<String>,
    pub rpc_method: Option<RpcMethodInfo>,
}

impl RouteDescriptor {
    pub fn new(method: &str, path: &str, handler: HandlerRef) -> Result<Self, DispatchError> {
        Ok(Self {
            method: normalize_method(method)?,
            path: normalize_path(path)?,
            handler,
            request_schema: None,
            response_schema: None,
            parameter_schema: None,
            params: Vec::new(),
            dependencies: Vec::new(),
            rpc_method: None,
        })
    }

    #[must_use]
    pub fn with_request_schema(mut self, schema: Value) -> Self {
        self.request_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_parameter_schema(mut self, schema: Value) -> Self {
        self.parameter_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn with_params<I: IntoIterator<Item = ParamSpec>>(mut self, params: I) -> Self {
        self.params.extend(params);
        self
    }

    #[must_use]
    pub fn with_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_rpc_method(mut self, info: RpcMethodInfo) -> Self {
        self.rpc_method = Some(info);
        self
    }

    /// `"GET /users/{id}"`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Serializable description handed to transports and doc generators.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        json!({
            "method": self.method.as_str(),
            "path": self.path,
            "handler_name": self.handler.label(),
            "request_schema": self.request_schema,
            "response_schema": self.response_schema,
            "parameter_schema": self.parameter_schema,
            "dependencies": self.dependencies,
            "jsonrpc_method": self.rpc_method.as_ref().map(RpcMethodInfo::to_map),
        })
    }

    fn finalize(&mut self) {
        let inferred = infer_parameter_schema(&self.path, &self.params);
        self.parameter_schema = merge_parameter_schema(inferred, self.parameter_schema.take());
        if self.request_schema.is_none() {
            self.request_schema = infer_request_schema(&self.params);
        }
    }
}

/// Ordered, method-and-path keyed table of routes.
///
/// Registering the same `(method, path)` twice either replaces the earlier
/// route in place (keeping its position) or is rejected, depending on the
/// [`DuplicatePolicy`].
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: Vec<Arc<RouteDescriptor>>,
    index: HashMap<(Method, String), usize>,
    policy: DuplicatePolicy,
    /// Labels of routes registered more than once under `Replace`
    replaced: Vec<String>,
}

impl RouteRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Registry applying the configured duplicate policy.
    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::with_policy(config.duplicate_policy)
    }

    #[must_use]
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Routes that were overwritten by a later registration, in order
    #[must_use]
    pub fn replaced(&self) -> &[String] {
        &self.replaced
    }

    pub fn register(&mut self, mut descriptor: RouteDescriptor) -> Result<&mut Self, DispatchError> {
        descriptor.finalize();
        let key = (descriptor.method.clone(), descriptor.path.clone());

        match self.index.get(&key) {
            Some(&pos) => match self.policy {
                DuplicatePolicy::Reject => {
                    return Err(DispatchError::invalid_argument(format!(
                        "route {} is already registered",
                        descriptor.label()
                    )));
                }
                DuplicatePolicy::Replace => {
                    warn!(route = %descriptor.label(), "Replacing existing route registration");
                    self.replaced.push(descriptor.label());
                    self.routes[pos] = Arc::new(descriptor);
                }
            },
            None => {
                debug!(
                    route = %descriptor.label(),
                    handler = %descriptor.handler.label(),
                    params = descriptor.params.len(),
                    dependencies = descriptor.dependencies.len(),
                    "Route registered"
                );
                self.index.insert(key, self.routes.len());
                self.routes.push(Arc::new(descriptor));
            }
        }
        Ok(self)
    }

    /// Register `handler` for `method path` with no schemas.
    pub fn route(
        &mut self,
        method: &str,
        path: &str,
        handler: HandlerRef,
    ) -> Result<&mut Self, DispatchError> {
        self.register(RouteDescriptor::new(method, path, handler)?)
    }

    /// Register a closure handler for `method path`.
    pub fn route_fn<F>(&mut self, method: &str, path: &str, f: F) -> Result<&mut Self, DispatchError>
    where
        F: Fn(&DispatchRequest, &ResolvedDependencies) -> Result<DispatchResponse, DispatchError>
            + Send
            + Sync
            + 'static,
    {
        self.route(method, path, HandlerRef::Inline(handler_fn(f)))
    }

    /// Route registered for `method path`, if any (method is case-insensitive)
    #[must_use]
    pub fn get(&self, method: &str, path: &str) -> Option<Arc<RouteDescriptor>> {
        let method = normalize_method(method).ok()?;
        let path = normalize_path(path).ok()?;
        self.index
            .get(&(method, path))
            .map(|&pos| Arc::clone(&self.routes[pos]))
    }

    /// Registered routes in registration order
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<RouteDescriptor>> {
        self.routes.clone()
    }

    /// Schema payload for every route, in registration order
    #[must_use]
    pub fn payload(&self) -> Value {
        Value::Array(self.routes.iter().map(|r| r.to_payload()).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub(crate) fn log_summary(&self) {
        info!(routes_count = self.routes.len(), "Routing table loaded");
        for route in &self.routes {
            debug!(
                method = %route.method,
                path = %route.path,
                handler = %route.handler.label(),
                "Route"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_is_upper_cased_and_query_stripped() {
        let d = RouteDescriptor::new("get", "/items?debug=1", HandlerRef::named("items")).unwrap();
        assert_eq!(d.method, Method::GET);
        assert_eq!(d.path, "/items");
    }

    #[test]
    fn empty_path_is_invalid() {
        let err = RouteDescriptor::new("GET", "", HandlerRef::named("x")).unwrap_err();
        assert_eq!(err.code().as_str(), "invalid_argument");
    }

    #[test]
    fn registration_infers_path_params() {
        let mut reg = RouteRegistry::new();
        reg.route("GET", "/users/{id}", HandlerRef::named("user")).unwrap();
        let route = reg.get("get", "/users/{id}").unwrap();
        let schema = route.parameter_schema.as_ref().unwrap();
        assert_eq!(schema["properties"]["id"]["source"], "path");
        assert_eq!(schema["required"], json!(["id"]));
    }

    #[test]
    fn replacements_are_recorded() {
        let mut reg = RouteRegistry::new();
        reg.route("GET", "/a", HandlerRef::named("one")).unwrap();
        reg.route("get", "/a", HandlerRef::named("two")).unwrap();
        assert_eq!(reg.replaced(), ["GET /a".to_string()]);

        let strict = RouteRegistry::from_config(
            &RuntimeConfig::default().with_duplicate_policy(DuplicatePolicy::Reject),
        );
        assert_eq!(strict.policy(), DuplicatePolicy::Reject);
    }
}
