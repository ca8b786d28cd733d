use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::background::{BackgroundExecutor, CoroutineExecutor};
use crate::di::{DependencyContainer, ResolvedDependencies};
use crate::error::{panic_message, DispatchError, ErrorEnvelope};
use crate::grpc::{GrpcRequest, GrpcResponse, ServiceRegistry};
use crate::hooks::{
    run_error_hook, run_request_hook, run_response_hook, HookResult, HookStage, LifecycleHooks,
    PipelineState, PipelineTrace,
};
use crate::ids::RequestId;
use crate::router::{CompiledRoutes, RouteDescriptor, RouteMatch, RouteRegistry};
use crate::runtime_config::{DuplicatePolicy, RuntimeConfig};
use crate::validator::{JsonSchemaValidator, ValidationOutcome, Validator};

use super::core::{handler_fn, DispatchRequest, DispatchResponse, Handler};
use super::params::extract_params;

/// Collects routes, services, dependencies and hooks; `build()` freezes them
/// into a [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    config: RuntimeConfig,
    routes: RouteRegistry,
    handlers: HashMap<String, Arc<dyn Handler>>,
    replaced_handlers: Vec<String>,
    services: ServiceRegistry,
    dependencies: Option<DependencyContainer>,
    hooks: LifecycleHooks,
    validator: Option<Arc<dyn Validator>>,
    background: Option<Arc<dyn BackgroundExecutor>>,
}

impl DispatcherBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_routes(mut self, routes: RouteRegistry) -> Self {
        self.routes = routes;
        self
    }

    /// Provide the handler for routes that reference `name`.
    #[must_use]
    pub fn register_handler(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            warn!(handler_name = %name, "Replaced existing handler");
            self.replaced_handlers.push(name);
        }
        self
    }

    /// Closure form of [`register_handler`](Self::register_handler).
    #[must_use]
    pub fn register_handler_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&DispatchRequest, &ResolvedDependencies) -> Result<DispatchResponse, DispatchError>
            + Send
            + Sync
            + 'static,
    {
        self.register_handler(name, handler_fn(f))
    }

    #[must_use]
    pub fn with_services(mut self, services: ServiceRegistry) -> Self {
        self.services = services;
        self
    }

    #[must_use]
    pub fn with_dependencies(mut self, container: DependencyContainer) -> Self {
        self.dependencies = Some(container);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn with_background_executor(mut self, executor: Arc<dyn BackgroundExecutor>) -> Self {
        self.background = Some(executor);
        self
    }

    fn check_duplicates(&self) -> Result<(), DispatchError> {
        if self.config.duplicate_policy != DuplicatePolicy::Reject {
            return Ok(());
        }
        let duplicates: Vec<String> = self
            .routes
            .replaced()
            .iter()
            .map(|label| format!("route {label}"))
            .chain(self.services.replaced().iter().map(|name| format!("service {name}")))
            .chain(self.replaced_handlers.iter().map(|name| format!("handler {name}")))
            .collect();
        if duplicates.is_empty() {
            return Ok(());
        }
        Err(DispatchError::invalid_argument(format!(
            "duplicate registrations rejected: {}",
            duplicates.join(", ")
        )))
    }

    /// Resolve handler references and check declared dependencies.
    ///
    /// Fails with `handler_not_callable` when a route names a handler that
    /// was never registered, and with `invalid_argument` when a route
    /// declares a dependency the container does not know. Under
    /// [`DuplicatePolicy::Reject`] any route, service or handler that was
    /// registered twice also fails with `invalid_argument`.
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        self.check_duplicates()?;
        let dependencies = self.dependencies.unwrap_or_default();

        for route in self.routes.snapshot() {
            if let Some(missing) = route
                .dependencies
                .iter()
                .find(|name| !dependencies.contains(name))
            {
                return Err(DispatchError::invalid_argument(format!(
                    "route {} declares unknown dependency \"{missing}\"",
                    route.label()
                )));
            }
        }

        let routes = CompiledRoutes::compile(&self.routes, &self.handlers)?;
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(JsonSchemaValidator::new()));
        let background = self
            .background
            .unwrap_or_else(|| Arc::new(CoroutineExecutor::from_config(&self.config)));

        info!(
            routes = routes.len(),
            services = self.services.len(),
            dependencies = dependencies.len(),
            hooks = ?self.hooks,
            validate_responses = self.config.validate_responses,
            "Dispatcher built"
        );

        Ok(Dispatcher {
            routes,
            services: self.services,
            dependencies,
            hooks: self.hooks,
            validator,
            background,
            config: self.config,
        })
    }
}

/// Drives every request through hooks, matching, dependency resolution,
/// validation and the handler, and always produces a response.
///
/// Immutable after `build()`; share it between coroutines behind an `Arc`.
pub struct Dispatcher {
    routes: CompiledRoutes,
    services: ServiceRegistry,
    dependencies: DependencyContainer,
    hooks: LifecycleHooks,
    validator: Arc<dyn Validator>,
    background: Arc<dyn BackgroundExecutor>,
    config: RuntimeConfig,
}

impl Dispatcher {
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Dispatch one HTTP-style request.
    ///
    /// Errors from any stage, including panics in handlers and hooks, come
    /// back as a response carrying an [`ErrorEnvelope`].
    pub fn dispatch(&self, mut req: DispatchRequest) -> DispatchResponse {
        let start = Instant::now();
        let request_id = req.request_id;
        let mut trace = PipelineTrace::new();
        let mut matched: Option<Arc<RouteDescriptor>> = None;

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.run_request_side(&mut req, &mut trace, &mut matched)
        }))
        .unwrap_or_else(|payload| {
            Err(DispatchError::Panic {
                message: panic_message(payload.as_ref()),
            })
        });

        let resp = match outcome {
            Ok(resp) => resp,
            Err(err) => {
                trace.advance(PipelineState::Error);
                self.handle_error(&req, &err)
            }
        };

        trace.advance(PipelineState::Responding);
        if let Some(route) = &matched {
            self.check_response(&req, route, &resp);
        }
        let resp = self.apply_on_response(&req, resp);
        trace.advance(PipelineState::Done);

        info!(
            request_id = %request_id,
            method = %req.method,
            path = %req.path,
            route = ?req.route_pattern,
            status = resp.status,
            latency_ms = start.elapsed().as_millis() as u64,
            stages = ?trace.visited(),
            "Request dispatched"
        );
        resp
    }

    fn run_request_side(
        &self,
        req: &mut DispatchRequest,
        trace: &mut PipelineTrace,
        matched: &mut Option<Arc<RouteDescriptor>>,
    ) -> Result<DispatchResponse, DispatchError> {
        trace.advance(PipelineState::Requested);
        if let Some(resp) = self.run_stage(HookStage::OnRequest, req)? {
            return Ok(resp);
        }

        let route_match = self.find_route(req)?;
        *matched = Some(Arc::clone(&route_match.route));
        req.path_params = route_match.path_params.clone();
        req.route_pattern = Some(Arc::from(route_match.route.path.as_str()));

        let deps = self
            .dependencies
            .resolve_all(&route_match.route.dependencies)?;

        trace.advance(PipelineState::Validating);
        if let Some(resp) = self.run_stage(HookStage::PreValidation, req)? {
            return Ok(resp);
        }

        req.params = extract_params(req, &route_match.route, self.validator.as_ref())?;

        if let Some(resp) = self.run_stage(HookStage::PreHandler, req)? {
            return Ok(resp);
        }

        trace.advance(PipelineState::Handling);
        self.invoke_handler(&route_match, req, &deps)
    }

    fn find_route(&self, req: &DispatchRequest) -> Result<RouteMatch, DispatchError> {
        let not_found = || DispatchError::RouteNotFound {
            method: req.method.to_string(),
            path: req.path.clone(),
        };
        let route_match = self
            .routes
            .match_route(&req.method, &req.path)
            .ok_or_else(not_found)?;
        if !route_match.handler.matches(req) {
            debug!(
                request_id = %req.request_id,
                route = %route_match.route.label(),
                "Handler declined request"
            );
            return Err(not_found());
        }
        Ok(route_match)
    }

    fn run_stage(
        &self,
        stage: HookStage,
        req: &mut DispatchRequest,
    ) -> Result<Option<DispatchResponse>, DispatchError> {
        for (position, hook) in self.hooks.request_hooks(stage).iter().enumerate() {
            if let HookResult::ShortCircuit(resp) = run_request_hook(stage, hook, req)? {
                debug!(
                    request_id = %req.request_id,
                    stage = %stage,
                    position,
                    status = resp.status,
                    "Hook short-circuited request"
                );
                return Ok(Some(resp));
            }
        }
        Ok(None)
    }

    fn invoke_handler(
        &self,
        route_match: &RouteMatch,
        req: &DispatchRequest,
        deps: &ResolvedDependencies,
    ) -> Result<DispatchResponse, DispatchError> {
        let started = Instant::now();
        let handler_name = route_match.route.handler.label();
        debug!(
            request_id = %req.request_id,
            handler_name = %handler_name,
            path_params = ?req.path_params,
            query_params = ?req.query_params,
            "Handler execution start"
        );

        let result = catch_unwind(AssertUnwindSafe(|| route_match.handler.handle(req, deps)));
        let execution_time_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(resp)) => {
                debug!(
                    request_id = %req.request_id,
                    handler_name = %handler_name,
                    status = resp.status,
                    execution_time_ms,
                    "Handler execution complete"
                );
                Ok(resp)
            }
            Ok(Err(err)) => Err(err),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    request_id = %req.request_id,
                    handler_name = %handler_name,
                    panic_message = %message,
                    execution_time_ms,
                    "Handler panicked"
                );
                Err(DispatchError::Panic { message })
            }
        }
    }

    fn handle_error(&self, req: &DispatchRequest, err: &DispatchError) -> DispatchResponse {
        let envelope = err.to_envelope();
        if envelope.status() >= 500 {
            error!(request_id = %req.request_id, code = %envelope.code, error = %err, "Request failed");
        } else {
            warn!(request_id = %req.request_id, code = %envelope.code, error = %err, "Request rejected");
        }

        for hook in &self.hooks.on_error {
            match run_error_hook(hook, req, &envelope) {
                Ok(HookResult::Continue) => {}
                Ok(HookResult::ShortCircuit(resp)) => return resp,
                Err(hook_err) => {
                    error!(
                        request_id = %req.request_id,
                        error = %hook_err,
                        original_code = %envelope.code,
                        "onError hook failed; using original error"
                    );
                    break;
                }
            }
        }
        DispatchResponse::from_envelope(envelope)
    }

    /// Log a response that does not match the route's response schema.
    fn check_response(&self, req: &DispatchRequest, route: &RouteDescriptor, resp: &DispatchResponse) {
        if !self.config.validate_responses || resp.is_error() {
            return;
        }
        let Some(schema) = &route.response_schema else {
            return;
        };
        if let ValidationOutcome::Invalid(issues) = self.validator.validate(&resp.body, schema) {
            warn!(
                request_id = %req.request_id,
                route = %route.label(),
                issues = ?issues.iter().map(|i| i.message.as_str()).collect::<Vec<_>>(),
                "Response does not match response schema"
            );
        }
    }

    fn apply_on_response(&self, req: &DispatchRequest, mut resp: DispatchResponse) -> DispatchResponse {
        for hook in &self.hooks.on_response {
            match run_response_hook(hook, req, &resp) {
                Ok(HookResult::Continue) => {}
                Ok(HookResult::ShortCircuit(replacement)) => resp = replacement,
                Err(err) => {
                    error!(request_id = %req.request_id, error = %err, "onResponse hook failed");
                    return DispatchResponse::from_envelope(err.to_envelope());
                }
            }
        }
        resp
    }

    /// Dispatch one RPC call to its service handler.
    ///
    /// Handler errors and panics come back as an [`ErrorEnvelope`].
    pub fn handle_rpc(&self, request: &GrpcRequest) -> Result<GrpcResponse, ErrorEnvelope> {
        let request_id = RequestId::from_metadata(&request.metadata);
        let result = catch_unwind(AssertUnwindSafe(|| self.services.handle_request(request)))
            .unwrap_or_else(|payload| {
                Err(DispatchError::Panic {
                    message: panic_message(payload.as_ref()),
                })
            });
        result.map_err(|err| {
            error!(
                request_id = %request_id,
                service = %request.service_name,
                method = %request.method_name,
                error = %err,
                "RPC failed"
            );
            err.to_envelope()
        })
    }

    /// [`handle_rpc`](Self::handle_rpc) with errors folded into gRPC
    /// status metadata.
    #[must_use]
    pub fn handle_rpc_response(&self, request: &GrpcRequest) -> GrpcResponse {
        self.handle_rpc(request)
            .unwrap_or_else(|envelope| GrpcResponse::from_envelope(&envelope))
    }

    /// Hand `task` to the background executor; its outcome is only logged.
    pub fn spawn_background<F>(&self, task: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.background.run(Box::new(task));
    }

    /// Frozen route table in registration order
    #[must_use]
    pub fn routes(&self) -> Vec<Arc<RouteDescriptor>> {
        self.routes.routes()
    }

    #[must_use]
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    #[must_use]
    pub fn dependencies(&self) -> &DependencyContainer {
        &self.dependencies
    }

    #[must_use]
    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes)
            .field("services", &self.services)
            .field("dependencies", &self.dependencies)
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .finish()
    }
}
