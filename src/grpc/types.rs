use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DispatchError, ErrorEnvelope};

/// Metadata key carrying the gRPC status name
pub const GRPC_STATUS: &str = "grpc-status";
/// Metadata key carrying the human-readable error message
pub const GRPC_MESSAGE: &str = "grpc-message";
/// Metadata key carrying the stable error code of an envelope
pub const ERROR_CODE: &str = "error-code";

/// An RPC call as decoded by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrpcRequest {
    /// Fully qualified service name, e.g. `pkg.UserService`
    pub service_name: String,
    pub method_name: String,
    pub payload: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

impl GrpcRequest {
    pub fn new(service_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            method_name: method_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// An RPC reply: opaque payload plus metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrpcResponse {
    pub payload: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

impl GrpcResponse {
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            metadata: HashMap::new(),
        }
    }

    /// Error reply: empty payload, `grpc-status: INTERNAL` and the message.
    ///
    /// `extra` is merged in but never overrides the two status keys.
    #[must_use]
    pub fn error(message: impl Into<String>, extra: Option<HashMap<String, String>>) -> Self {
        let mut metadata = extra.unwrap_or_default();
        metadata.insert(GRPC_STATUS.to_string(), "INTERNAL".to_string());
        metadata.insert(GRPC_MESSAGE.to_string(), message.into());
        Self {
            payload: Vec::new(),
            metadata,
        }
    }

    /// Error reply carrying an envelope's code, message and gRPC status.
    #[must_use]
    pub fn from_envelope(envelope: &ErrorEnvelope) -> Self {
        let mut extra = HashMap::new();
        extra.insert(ERROR_CODE.to_string(), envelope.code.as_str().to_string());
        let mut resp = Self::error(envelope.message.clone(), Some(extra));
        resp.metadata.insert(
            GRPC_STATUS.to_string(),
            envelope.code.grpc_status().to_string(),
        );
        resp
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// True when `grpc-status` is present and not `OK`
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.get_metadata(GRPC_STATUS).is_some_and(|s| s != "OK")
    }
}

/// Handler for every method of one RPC service.
pub trait GrpcHandler: Send + Sync {
    fn handle_request(&self, request: &GrpcRequest) -> Result<GrpcResponse, DispatchError>;
}

struct FnGrpcHandler<F>(F);

impl<F> GrpcHandler for FnGrpcHandler<F>
where
    F: Fn(&GrpcRequest) -> Result<GrpcResponse, DispatchError> + Send + Sync,
{
    fn handle_request(&self, request: &GrpcRequest) -> Result<GrpcResponse, DispatchError> {
        (self.0)(request)
    }
}

/// Wrap a closure as a [`GrpcHandler`].
pub fn grpc_handler_fn<F>(f: F) -> Arc<dyn GrpcHandler>
where
    F: Fn(&GrpcRequest) -> Result<GrpcResponse, DispatchError> + Send + Sync + 'static,
{
    Arc::new(FnGrpcHandler(f))
}
