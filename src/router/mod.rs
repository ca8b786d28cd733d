//! # Router Module
//!
//! Route registration and path matching.
//!
//! ## Overview
//!
//! - [`RouteRegistry`] collects [`RouteDescriptor`]s keyed by method and path.
//!   Registration computes the route's merged parameter schema and, when a
//!   body parameter is declared, its request schema.
//! - [`CompiledRoutes`] freezes a registry for matching: every path template
//!   is turned into an anchored regex and every handler reference is resolved.
//!
//! ## Architecture
//!
//! 1. **Compilation**: paths such as `/pets/{id}` become regexes that match
//!    and capture parameters. Named handlers are looked up once.
//! 2. **Matching**: each request is tested against compiled routes in
//!    registration order; the first match wins.
//!
//! ## Example
//!
//! ```
//! use switchyard::router::RouteRegistry;
//! use switchyard::dispatcher::DispatchResponse;
//! use serde_json::json;
//!
//! let mut routes = RouteRegistry::new();
//! routes
//!     .route_fn("GET", "/pets/{id}", |req, _deps| {
//!         Ok(DispatchResponse::ok(json!({"id": req.get_path_param("id")})))
//!     })
//!     .unwrap();
//! assert_eq!(routes.len(), 1);
//! ```

mod core;
mod registry;

pub use self::core::{CompiledRoutes, RouteMatch};
pub use registry::{normalize_method, normalize_path, HandlerRef, RouteDescriptor, RouteRegistry};
