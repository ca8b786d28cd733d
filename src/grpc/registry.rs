use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::runtime_config::{DuplicatePolicy, RuntimeConfig};

use super::types::{GrpcHandler, GrpcRequest, GrpcResponse};

/// Map from fully qualified service name to its handler.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    handlers: HashMap<String, Arc<dyn GrpcHandler>>,
    policy: DuplicatePolicy,
    /// Services registered more than once under `Replace`
    replaced: Vec<String>,
}

fn validate_service_name(name: &str) -> Result<(), DispatchError> {
    if name.is_empty() {
        return Err(DispatchError::invalid_argument("service name must not be empty"));
    }
    if !name.contains('.') || name.split('.').any(str::is_empty) {
        return Err(DispatchError::invalid_argument(format!(
            "service name \"{name}\" must be fully qualified (e.g. \"mypackage.MyService\")"
        )));
    }
    Ok(())
}

impl ServiceRegistry {
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

    /// Services that were overwritten by a later registration, in order
    #[must_use]
    pub fn replaced(&self) -> &[String] {
        &self.replaced
    }

    pub fn register_handler(
        &mut self,
        service_name: &str,
        handler: Arc<dyn GrpcHandler>,
    ) -> Result<&mut Self, DispatchError> {
        validate_service_name(service_name)?;
        if self.handlers.contains_key(service_name) {
            if self.policy == DuplicatePolicy::Reject {
                return Err(DispatchError::invalid_argument(format!(
                    "service \"{service_name}\" is already registered"
                )));
            }
            warn!(service = %service_name, "Replacing existing gRPC handler");
            self.replaced.push(service_name.to_string());
        } else {
            info!(service = %service_name, "gRPC handler registered");
        }
        self.handlers.insert(service_name.to_string(), handler);
        Ok(self)
    }

    /// Route `request` to the handler registered for its service.
    pub fn handle_request(&self, request: &GrpcRequest) -> Result<GrpcResponse, DispatchError> {
        let handler = self.handlers.get(&request.service_name).ok_or_else(|| {
            DispatchError::ServiceNotFound {
                service: request.service_name.clone(),
            }
        })?;
        debug!(
            service = %request.service_name,
            method = %request.method_name,
            payload_len = request.payload.len(),
            "Dispatching RPC"
        );
        handler.handle_request(request)
    }

    #[must_use]
    pub fn has_handler(&self, service_name: &str) -> bool {
        self.handlers.contains_key(service_name)
    }

    /// Registered service names, sorted
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn clear(&mut self) -> &mut Self {
        self.handlers.clear();
        self.replaced.clear();
        self
    }

    /// Remove every handler, returning how many were removed
    pub fn unregister_all(&mut self) -> usize {
        let count = self.handlers.len();
        self.handlers.clear();
        self.replaced.clear();
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.service_names())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grpc::grpc_handler_fn;

    fn echo() -> Arc<dyn GrpcHandler> {
        grpc_handler_fn(|req| Ok(GrpcResponse::new(req.payload.clone())))
    }

    #[test]
    fn rejects_unqualified_names() {
        let mut reg = ServiceRegistry::new();
        for bad in ["", "Service", ".Service", "pkg."] {
            assert!(reg.register_handler(bad, echo()).is_err(), "{bad:?}");
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn reject_policy_refuses_duplicates() {
        let mut reg = ServiceRegistry::with_policy(DuplicatePolicy::Reject);
        reg.register_handler("pkg.Svc", echo()).unwrap();
        assert!(reg.register_handler("pkg.Svc", echo()).is_err());
        assert_eq!(reg.len(), 1);
        assert!(reg.replaced().is_empty());
    }

    #[test]
    fn replacements_are_recorded_until_cleared() {
        let mut reg = ServiceRegistry::new();
        reg.register_handler("pkg.Svc", echo()).unwrap();
        reg.register_handler("pkg.Svc", echo()).unwrap();
        assert_eq!(reg.replaced(), ["pkg.Svc".to_string()]);
        reg.clear();
        assert!(reg.replaced().is_empty());
    }
}
