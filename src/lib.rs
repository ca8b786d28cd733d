//! # Switchyard
//!
//! **Switchyard** is a transport-agnostic request-dispatch core. HTTP-style
//! requests and RPC-style calls enter through one [`Dispatcher`], which
//! matches routes, resolves dependencies, runs lifecycle hooks, validates
//! inputs, invokes handlers and turns every failure into one structured
//! [`ErrorEnvelope`].
//!
//! ## Architecture
//!
//! - **[`router`]** - Route registration and regex-based path matching
//! - **[`grpc`]** - Fully qualified service name → RPC handler registry
//! - **[`hooks`]** - `onRequest`, `preValidation`, `preHandler`, `onError`,
//!   `onResponse` hooks and their results
//! - **[`di`]** - Named values and factories resolved per request
//! - **[`schema`]** - Parameter declarations, schema inference, RPC metadata
//! - **[`validator`]** - Validation seam with a cached `jsonschema` default
//! - **[`dispatcher`]** - The orchestrator tying everything together
//! - **[`sse`]** - Stream forwarding with error shielding, SSE framing
//! - **[`background`]** - Fire-and-forget tasks on `may` coroutines
//! - **[`error`]** - Error codes, the envelope and the crate error type
//! - **[`runtime_config`]**, **[`logging`]** - Configuration and tracing setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Transport
//!     participant Dispatcher
//!     participant Hooks
//!     participant Router
//!     participant DI as DependencyContainer
//!     participant Validator
//!     participant Handler
//!
//!     Transport->>Dispatcher: dispatch(DispatchRequest)
//!     Dispatcher->>Hooks: onRequest
//!     alt ShortCircuit
//!         Hooks-->>Dispatcher: response
//!     end
//!     Dispatcher->>Router: match_route(method, path)
//!     alt No Route Match
//!         Router-->>Dispatcher: route_not_found
//!     end
//!     Dispatcher->>DI: resolve_all(route.dependencies)
//!     Dispatcher->>Hooks: preValidation
//!     Dispatcher->>Validator: validate params / body
//!     alt Validation Failed
//!         Validator-->>Dispatcher: validation_failed
//!     end
//!     Dispatcher->>Hooks: preHandler
//!     Dispatcher->>Handler: handle(request, deps)
//!     alt Error or Panic
//!         Dispatcher->>Hooks: onError(envelope)
//!     end
//!     Dispatcher->>Hooks: onResponse
//!     Dispatcher-->>Transport: DispatchResponse
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use http::Method;
//! use serde_json::json;
//! use switchyard::{DependencyContainer, DispatchRequest, DispatchResponse, Dispatcher, RouteRegistry};
//!
//! let container = DependencyContainer::builder()
//!     .provide_value("greeting", "hello".to_string())
//!     .build();
//!
//! let mut routes = RouteRegistry::new();
//! routes
//!     .register(
//!         switchyard::RouteDescriptor::new(
//!             "GET",
//!             "/greet/{name}",
//!             switchyard::HandlerRef::Inline(switchyard::dispatcher::handler_fn(|req, deps| {
//!                 let greeting = deps.get_typed::<String>("greeting")?;
//!                 let name = req.get_path_param("name").unwrap_or("world");
//!                 Ok(DispatchResponse::ok(json!({"message": format!("{greeting}, {name}")})))
//!             })),
//!         )
//!         .unwrap()
//!         .with_dependencies(["greeting"]),
//!     )
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::builder()
//!     .with_routes(routes)
//!     .with_dependencies(container)
//!     .build()
//!     .unwrap();
//!
//! let resp = dispatcher.dispatch(DispatchRequest::new(Method::GET, "/greet/ada"));
//! assert_eq!(resp.body["message"], "hello, ada");
//! ```
//!
//! ## Runtime Configuration
//!
//! [`RuntimeConfig::from_env`] reads:
//!
//! - `SWITCHYARD_STACK_SIZE` - background coroutine stack size (decimal or `0x` hex)
//! - `SWITCHYARD_DUPLICATE_POLICY` - `replace` (default) or `reject`
//! - `SWITCHYARD_VALIDATE_RESPONSES` - `true` to check handler responses
//!
//! Logging is configured separately through [`logging::LogConfig`].

pub mod background;
pub mod di;
pub mod dispatcher;
pub mod error;
pub mod grpc;
pub mod hooks;
pub mod ids;
pub mod logging;
pub mod router;
pub mod runtime_config;
pub mod schema;
pub mod sse;
pub mod validator;

pub use background::{BackgroundExecutor, BackgroundTask, CoroutineExecutor, InlineExecutor};
pub use di::{DependencyContainer, ResolvedDependencies};
pub use dispatcher::{DispatchRequest, DispatchResponse, Dispatcher, DispatcherBuilder, Handler};
pub use error::{DispatchError, ErrorCode, ErrorEnvelope};
pub use grpc::{GrpcHandler, GrpcRequest, GrpcResponse, ServiceRegistry};
pub use hooks::{HookError, HookResult, HookStage, LifecycleHooks};
pub use ids::RequestId;
pub use router::{HandlerRef, RouteDescriptor, RouteRegistry};
pub use runtime_config::{DuplicatePolicy, RuntimeConfig};
pub use schema::{ParamSpec, ParameterSource, RpcMethodInfo};
pub use validator::{JsonSchemaValidator, ValidationIssue, ValidationOutcome, Validator};
