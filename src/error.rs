//! # Error Module
//!
//! Every failure path in the dispatch core converges on one shape, the
//! [`ErrorEnvelope`]: `{code, message, details}`. The `code` is a stable
//! machine-readable tag ([`ErrorCode`]) that callers can branch on; the
//! message is for humans; `details` carries structured context such as the
//! list of offending fields for a validation failure.
//!
//! Internally the crate works with [`DispatchError`], one variant per failure
//! kind. Configuration-time errors (registration, builder `build()`) are
//! returned to the caller and should abort setup. Per-request errors are
//! caught by the [`Dispatcher`](crate::dispatcher::Dispatcher) and converted
//! into envelopes; they never escape as panics.
//!
//! ## Surfaces
//!
//! - HTTP-style: [`ErrorEnvelope::to_http_body`] produces
//!   `{"error": message, "code": code, "details": details}` and
//!   [`ErrorEnvelope::status`] picks the status code (≥400 for client
//!   errors, ≥500 for server faults and panics).
//! - RPC-style: [`ErrorCode::grpc_status`] names the `grpc-status` value
//!   used by [`GrpcResponse::from_envelope`](crate::grpc::GrpcResponse::from_envelope).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::hooks::HookStage;
use crate::validator::ValidationIssue;

/// Stable error codes surfaced in [`ErrorEnvelope::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed registration input
    InvalidArgument,
    /// Request failed schema validation
    ValidationFailed,
    /// Dependency name not present in the container
    UnknownDependency,
    /// Factory resolution revisited a name already being resolved
    CyclicDependency,
    /// A dependency factory failed or produced a value of the wrong type
    DependencyFailed,
    HookOnRequestFailed,
    HookPreValidationFailed,
    HookPreHandlerFailed,
    HookOnErrorFailed,
    HookOnResponseFailed,
    /// RPC dispatch found no handler for the named service
    ServiceNotFound,
    /// A route references a handler that cannot be invoked
    HandlerNotCallable,
    /// No route is registered for the method and path
    RouteNotFound,
    /// The handler returned an error
    HandlerError,
    /// Uncaught runtime error in handler, hook or stream producer code
    Panic,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::ValidationFailed => "validation_failed",
            ErrorCode::UnknownDependency => "unknown_dependency",
            ErrorCode::CyclicDependency => "cyclic_dependency",
            ErrorCode::DependencyFailed => "dependency_failed",
            ErrorCode::HookOnRequestFailed => "hook_on_request_failed",
            ErrorCode::HookPreValidationFailed => "hook_pre_validation_failed",
            ErrorCode::HookPreHandlerFailed => "hook_pre_handler_failed",
            ErrorCode::HookOnErrorFailed => "hook_on_error_failed",
            ErrorCode::HookOnResponseFailed => "hook_on_response_failed",
            ErrorCode::ServiceNotFound => "service_not_found",
            ErrorCode::HandlerNotCallable => "handler_not_callable",
            ErrorCode::RouteNotFound => "route_not_found",
            ErrorCode::HandlerError => "handler_error",
            ErrorCode::Panic => "panic",
        }
    }

    /// Default HTTP status for this code
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidArgument => 400,
            ErrorCode::RouteNotFound | ErrorCode::ServiceNotFound => 404,
            ErrorCode::ValidationFailed => 422,
            _ => 500,
        }
    }

    /// gRPC status name reported in `grpc-status` metadata
    #[must_use]
    pub fn grpc_status(&self) -> &'static str {
        match self {
            ErrorCode::ServiceNotFound | ErrorCode::RouteNotFound => "UNIMPLEMENTED",
            ErrorCode::ValidationFailed | ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::UnknownDependency => "FAILED_PRECONDITION",
            _ => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical `{code, message, details}` error shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Value>,
    /// Status chosen by the producer of the error (handler errors only)
    #[serde(skip)]
    status_override: Option<u16>,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            status_override: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_override = Some(status);
        self
    }

    /// HTTP status for this envelope
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status_override
            .unwrap_or_else(|| self.code.http_status())
    }

    /// Body used by the HTTP-style surface
    #[must_use]
    pub fn to_http_body(&self) -> Value {
        json!({
            "error": self.message,
            "code": self.code.as_str(),
            "details": self.details,
        })
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Every failure the dispatch core can produce.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("request validation failed ({} issue(s))", issues.len())]
    Validation { issues: Vec<ValidationIssue> },

    #[error("unknown dependency \"{name}\"")]
    UnknownDependency { name: String },

    #[error("cyclic dependency detected: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("dependency \"{name}\" failed: {message}")]
    DependencyFailed { name: String, message: String },

    #[error("Dependency \"{name}\" was not resolved for this request")]
    NotResolved { name: String },

    #[error("dependency \"{name}\" is not of type {expected}")]
    DependencyTypeMismatch { name: String, expected: &'static str },

    #[error("{stage} hook failed: {message}")]
    Hook {
        stage: HookStage,
        message: String,
        value: Option<Value>,
    },

    #[error("No gRPC handler registered for service \"{service}\"")]
    ServiceNotFound { service: String },

    #[error("handler \"{handler}\" for route {route} is not callable")]
    HandlerNotCallable { handler: String, route: String },

    #[error("no route registered for {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("{message}")]
    Handler {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    #[error("panic: {message}")]
    Panic { message: String },
}

impl DispatchError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        DispatchError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Handler-level failure with an explicit HTTP status
    pub fn handler(status: u16, message: impl Into<String>) -> Self {
        DispatchError::Handler {
            status,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            DispatchError::Validation { .. } => ErrorCode::ValidationFailed,
            DispatchError::UnknownDependency { .. } | DispatchError::NotResolved { .. } => {
                ErrorCode::UnknownDependency
            }
            DispatchError::CyclicDependency { .. } => ErrorCode::CyclicDependency,
            DispatchError::DependencyFailed { .. }
            | DispatchError::DependencyTypeMismatch { .. } => ErrorCode::DependencyFailed,
            DispatchError::Hook { stage, .. } => stage.error_code(),
            DispatchError::ServiceNotFound { .. } => ErrorCode::ServiceNotFound,
            DispatchError::HandlerNotCallable { .. } => ErrorCode::HandlerNotCallable,
            DispatchError::RouteNotFound { .. } => ErrorCode::RouteNotFound,
            DispatchError::Handler { .. } => ErrorCode::HandlerError,
            DispatchError::Panic { .. } => ErrorCode::Panic,
        }
    }

    /// Structured context for the envelope's `details` field
    #[must_use]
    pub fn details(&self) -> Option<Value> {
        match self {
            DispatchError::Validation { issues } => Some(json!({
                "errors": issues
                    .iter()
                    .map(ValidationIssue::to_value)
                    .collect::<Vec<_>>(),
            })),
            DispatchError::UnknownDependency { name } | DispatchError::NotResolved { name } => {
                Some(json!({ "name": name }))
            }
            DispatchError::CyclicDependency { path } => Some(json!({ "cycle": path })),
            DispatchError::DependencyFailed { name, message } => {
                Some(json!({ "name": name, "message": message }))
            }
            DispatchError::DependencyTypeMismatch { name, expected } => {
                Some(json!({ "name": name, "expected": expected }))
            }
            DispatchError::Hook {
                stage,
                message,
                value,
            } => {
                let mut details = json!({ "stage": stage.as_str(), "message": message });
                if let (Some(v), Some(obj)) = (value, details.as_object_mut()) {
                    obj.insert("value".to_string(), v.clone());
                }
                Some(details)
            }
            DispatchError::ServiceNotFound { service } => Some(json!({ "service": service })),
            DispatchError::HandlerNotCallable { handler, route } => {
                Some(json!({ "handler": handler, "route": route }))
            }
            DispatchError::RouteNotFound { method, path } => {
                Some(json!({ "method": method, "path": path }))
            }
            DispatchError::Handler { details, .. } => details.clone(),
            DispatchError::Panic { message } => Some(json!({ "message": message })),
            DispatchError::InvalidArgument { .. } => None,
        }
    }

    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let mut envelope = ErrorEnvelope::new(self.code(), self.to_string());
        envelope.details = self.details();
        if let DispatchError::Handler { status, .. } = self {
            envelope = envelope.with_status(*status);
        }
        envelope
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        DispatchError::Handler {
            status: 500,
            message: format!("{err:#}"),
            details: None,
        }
    }
}

impl From<DispatchError> for ErrorEnvelope {
    fn from(err: DispatchError) -> Self {
        err.to_envelope()
    }
}

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
