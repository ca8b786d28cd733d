//! # Dispatcher Module
//!
//! The dispatcher is the single entry point transports call for every
//! request. It owns the frozen route table, the RPC service registry, the
//! dependency container, the lifecycle hooks and the validator.
//!
//! ## Request Flow
//!
//! 1. `onRequest` hook
//! 2. route match (`route_not_found` when nothing matches or the handler's
//!    `matches` guard declines)
//! 3. dependency resolution for the names the route declares
//! 4. `preValidation` hook
//! 5. parameter extraction, coercion, defaults and validation
//! 6. `preHandler` hook
//! 7. handler
//! 8. `onError` hook, when any step above failed
//! 9. optional response schema check (logged only)
//! 10. `onResponse` hook
//!
//! A hook can short-circuit steps 2-7 by returning a response.
//!
//! ## Error Handling
//!
//! - Every failure becomes an [`ErrorEnvelope`](crate::error::ErrorEnvelope)
//!   attached to the returned [`DispatchResponse`]
//! - Handler and hook panics are caught and reported with code `panic`
//!   (handlers) or the stage's hook code (hooks)
//! - [`Dispatcher::dispatch`] never panics outward
//!
//! ## Example
//!
//! ```
//! use http::Method;
//! use serde_json::json;
//! use switchyard::dispatcher::{DispatchRequest, DispatchResponse, Dispatcher};
//! use switchyard::router::RouteRegistry;
//!
//! let mut routes = RouteRegistry::new();
//! routes
//!     .route_fn("GET", "/pets/{id}", |req, _deps| {
//!         Ok(DispatchResponse::ok(json!({"id": req.get_path_param("id")})))
//!     })
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::builder().with_routes(routes).build().unwrap();
//! let resp = dispatcher.dispatch(DispatchRequest::new(Method::GET, "/pets/7"));
//! assert_eq!(resp.status, 200);
//! assert_eq!(resp.body, json!({"id": "7"}));
//! ```

mod core;
mod dispatch;
mod params;

pub use self::core::{
    handler_fn, DispatchRequest, DispatchResponse, Handler, HeaderVec, ParamVec,
    MAX_INLINE_HEADERS, MAX_INLINE_PARAMS,
};
pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use params::coerce_param_value;
