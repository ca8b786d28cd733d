//! # RPC Service Dispatch
//!
//! A flat map from fully qualified service names (`pkg.UserService`) to
//! [`GrpcHandler`]s. The transport decodes frames into a [`GrpcRequest`];
//! [`ServiceRegistry::handle_request`] picks the handler by service name and
//! returns its [`GrpcResponse`] unchanged. Errors follow the gRPC metadata
//! convention: empty payload plus `grpc-status` and `grpc-message`.
//!
//! ```
//! use switchyard::grpc::{grpc_handler_fn, GrpcRequest, GrpcResponse, ServiceRegistry};
//!
//! let mut services = ServiceRegistry::new();
//! services
//!     .register_handler("pkg.Echo", grpc_handler_fn(|req| Ok(GrpcResponse::new(req.payload.clone()))))
//!     .unwrap();
//!
//! let resp = services
//!     .handle_request(&GrpcRequest::new("pkg.Echo", "Say").with_payload(b"hi".to_vec()))
//!     .unwrap();
//! assert_eq!(resp.payload, b"hi");
//! ```

mod registry;
mod types;

pub use registry::ServiceRegistry;
pub use types::{
    grpc_handler_fn, GrpcHandler, GrpcRequest, GrpcResponse, ERROR_CODE, GRPC_MESSAGE, GRPC_STATUS,
};
