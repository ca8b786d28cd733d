//! # Schema Module
//!
//! Value objects describing where request inputs come from and what shape
//! they must have. This is the leaf of the crate: the registry, validator and
//! dispatcher all build on it.
//!
//! - [`ParamSpec`] - one entry of a route's declarative parameter table
//!   (source, type, default or default factory, validation fragment)
//! - [`infer_parameter_schema`] - turns a parameter table into a composite
//!   object schema with `properties` and `required`
//! - [`merge_parameter_schema`] - combines an inferred schema with an
//!   explicitly supplied one (explicit wins)
//! - [`RpcMethodInfo`] - RPC metadata carried by a route
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use switchyard::schema::{infer_parameter_schema, ParamSpec};
//!
//! let params = vec![
//!     ParamSpec::path("id").with_type("integer"),
//!     ParamSpec::header("X-Custom-Header"),
//!     ParamSpec::query("limit").with_type("integer").with_default(json!(10)).unwrap(),
//! ];
//! let schema = infer_parameter_schema("/items/{id}", &params).unwrap();
//! assert_eq!(schema["properties"]["x-custom-header"]["source"], "header");
//! assert_eq!(schema["required"], json!(["id", "x-custom-header"]));
//! ```

mod infer;
mod rpc;
mod types;

pub use infer::{
    infer_parameter_schema, infer_request_schema, merge_parameter_schema, normalize_header_name,
    path_param_names, path_segments, PathSegment,
};
pub use rpc::RpcMethodInfo;
pub use types::{DefaultFactory, ParamSpec, ParameterSource};
