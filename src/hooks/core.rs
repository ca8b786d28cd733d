use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::dispatcher::{DispatchRequest, DispatchResponse};
use crate::error::{panic_message, DispatchError, ErrorEnvelope};

use super::pipeline::HookStage;

/// Outcome of a lifecycle hook.
#[derive(Debug, Clone, PartialEq)]
pub enum HookResult {
    /// Proceed to the next stage
    Continue,
    /// Stop the pipeline and answer with this response
    ShortCircuit(DispatchResponse),
}

impl HookResult {
    #[must_use]
    pub fn continue_() -> Self {
        HookResult::Continue
    }

    #[must_use]
    pub fn short_circuit(response: DispatchResponse) -> Self {
        HookResult::ShortCircuit(response)
    }

    #[must_use]
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, HookResult::ShortCircuit(_))
    }

    #[must_use]
    pub fn into_response(self) -> Option<DispatchResponse> {
        match self {
            HookResult::Continue => None,
            HookResult::ShortCircuit(resp) => Some(resp),
        }
    }
}

/// Failure raised by hook code.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HookError {
    pub message: String,
    /// Offending value when a hook broke its return contract
    pub value: Option<Value>,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            value: None,
        }
    }

    /// A dynamic hook returned something that is not a hook result.
    #[must_use]
    pub fn contract_violation(value: Value) -> Self {
        Self {
            message: "hook returned a value that is not a HookResult".to_string(),
            value: Some(value),
        }
    }

    pub(crate) fn into_dispatch(self, stage: HookStage) -> DispatchError {
        DispatchError::Hook {
            stage,
            message: self.message,
            value: self.value,
        }
    }
}

impl From<anyhow::Error> for HookError {
    fn from(err: anyhow::Error) -> Self {
        HookError::new(format!("{err:#}"))
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        HookError::new(message)
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        HookError::new(message)
    }
}

/// Hook run before the handler; may rewrite the request.
pub type RequestHook =
    Arc<dyn Fn(&mut DispatchRequest) -> Result<HookResult, HookError> + Send + Sync>;

/// Hook run when the pipeline produced an error envelope.
pub type ErrorHook =
    Arc<dyn Fn(&DispatchRequest, &ErrorEnvelope) -> Result<HookResult, HookError> + Send + Sync>;

/// Hook run on the final response. `Continue` keeps it, `ShortCircuit`
/// replaces it.
pub type ResponseHook = Arc<
    dyn Fn(&DispatchRequest, &DispatchResponse) -> Result<HookResult, HookError> + Send + Sync,
>;

/// Ordered hook chain per lifecycle stage.
///
/// Hooks at a stage run in registration order. Request-side chains stop at
/// the first short-circuit. Built once at configuration time and read-only
/// afterwards.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub(crate) on_request: Vec<RequestHook>,
    pub(crate) pre_validation: Vec<RequestHook>,
    pub(crate) pre_handler: Vec<RequestHook>,
    pub(crate) on_error: Vec<ErrorHook>,
    pub(crate) on_response: Vec<ResponseHook>,
}

impl LifecycleHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an `onRequest` hook; runs before routing.
    #[must_use]
    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut DispatchRequest) -> Result<HookResult, HookError> + Send + Sync + 'static,
    {
        self.on_request.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn pre_validation<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut DispatchRequest) -> Result<HookResult, HookError> + Send + Sync + 'static,
    {
        self.pre_validation.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn pre_handler<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut DispatchRequest) -> Result<HookResult, HookError> + Send + Sync + 'static,
    {
        self.pre_handler.push(Arc::new(hook));
        self
    }

    /// Append an `onError` hook. The first hook that short-circuits supplies
    /// the error response.
    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DispatchRequest, &ErrorEnvelope) -> Result<HookResult, HookError>
            + Send
            + Sync
            + 'static,
    {
        self.on_error.push(Arc::new(hook));
        self
    }

    /// Append an `onResponse` hook. Each hook sees the response left by the
    /// previous one.
    #[must_use]
    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DispatchRequest, &DispatchResponse) -> Result<HookResult, HookError>
            + Send
            + Sync
            + 'static,
    {
        self.on_response.push(Arc::new(hook));
        self
    }

    /// Append an already shared request-side hook at `stage`.
    ///
    /// Ignored for `OnError` and `OnResponse`, which take different
    /// signatures.
    #[must_use]
    pub fn with_request_hook(mut self, stage: HookStage, hook: RequestHook) -> Self {
        match stage {
            HookStage::OnRequest => self.on_request.push(hook),
            HookStage::PreValidation => self.pre_validation.push(hook),
            HookStage::PreHandler => self.pre_handler.push(hook),
            HookStage::OnError | HookStage::OnResponse => {
                tracing::warn!(stage = %stage, "Request hook cannot be installed at this stage");
            }
        }
        self
    }

    #[must_use]
    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.on_error.push(hook);
        self
    }

    #[must_use]
    pub fn with_response_hook(mut self, hook: ResponseHook) -> Self {
        self.on_response.push(hook);
        self
    }

    /// Number of hooks installed at `stage`
    #[must_use]
    pub fn count(&self, stage: HookStage) -> usize {
        match stage {
            HookStage::OnRequest => self.on_request.len(),
            HookStage::PreValidation => self.pre_validation.len(),
            HookStage::PreHandler => self.pre_handler.len(),
            HookStage::OnError => self.on_error.len(),
            HookStage::OnResponse => self.on_response.len(),
        }
    }

    #[must_use]
    pub fn has(&self, stage: HookStage) -> bool {
        self.count(stage) > 0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !HookStage::ALL.iter().any(|s| self.has(*s))
    }

    pub(crate) fn request_hooks(&self, stage: HookStage) -> &[RequestHook] {
        match stage {
            HookStage::OnRequest => &self.on_request,
            HookStage::PreValidation => &self.pre_validation,
            HookStage::PreHandler => &self.pre_handler,
            HookStage::OnError | HookStage::OnResponse => &[],
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let installed: Vec<String> = HookStage::ALL
            .iter()
            .filter(|s| self.has(**s))
            .map(|s| format!("{}x{}", s.as_str(), self.count(*s)))
            .collect();
        f.debug_struct("LifecycleHooks")
            .field("installed", &installed)
            .finish()
    }
}

fn shield<T>(
    stage: HookStage,
    call: impl FnOnce() -> Result<T, HookError>,
) -> Result<T, DispatchError> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(e.into_dispatch(stage)),
        Err(payload) => Err(DispatchError::Hook {
            stage,
            message: format!("hook panicked: {}", panic_message(payload.as_ref())),
            value: None,
        }),
    }
}

/// Run a request-side hook; errors and panics become stage errors.
pub(crate) fn run_request_hook(
    stage: HookStage,
    hook: &RequestHook,
    req: &mut DispatchRequest,
) -> Result<HookResult, DispatchError> {
    shield(stage, || hook(req))
}

pub(crate) fn run_error_hook(
    hook: &ErrorHook,
    req: &DispatchRequest,
    envelope: &ErrorEnvelope,
) -> Result<HookResult, DispatchError> {
    shield(HookStage::OnError, || hook(req, envelope))
}

pub(crate) fn run_response_hook(
    hook: &ResponseHook,
    req: &DispatchRequest,
    resp: &DispatchResponse,
) -> Result<HookResult, DispatchError> {
    shield(HookStage::OnResponse, || hook(req, resp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use http::Method;

    #[test]
    fn empty_hooks() {
        let hooks = LifecycleHooks::new();
        assert!(hooks.is_empty());
        let hooks = hooks.pre_handler(|_req| Ok(HookResult::Continue));
        assert!(!hooks.is_empty());
        assert!(hooks.has(HookStage::PreHandler));
        assert!(!hooks.has(HookStage::OnRequest));
    }

    #[test]
    fn hooks_accumulate_per_stage() {
        let hooks = LifecycleHooks::new()
            .on_request(|_req| Ok(HookResult::Continue))
            .on_request(|_req| Ok(HookResult::Continue))
            .on_response(|_req, _resp| Ok(HookResult::Continue));
        assert_eq!(hooks.count(HookStage::OnRequest), 2);
        assert_eq!(hooks.request_hooks(HookStage::OnRequest).len(), 2);
        assert_eq!(hooks.count(HookStage::OnResponse), 1);
        assert!(hooks.request_hooks(HookStage::OnResponse).is_empty());
    }

    #[test]
    fn hook_panic_becomes_stage_error() {
        let hook: RequestHook =
            Arc::new(|_req: &mut DispatchRequest| -> Result<HookResult, HookError> { panic!("kaboom") });
        let mut req = DispatchRequest::new(Method::GET, "/");
        let err = run_request_hook(HookStage::PreValidation, &hook, &mut req).unwrap_err();
        assert_eq!(err.code(), ErrorCode::HookPreValidationFailed);
        assert!(err.to_string().contains("kaboom"));
    }

    #[test]
    fn hook_error_carries_message() {
        let hook: RequestHook = Arc::new(|_req: &mut DispatchRequest| -> Result<HookResult, HookError> {
            Err(HookError::new("denied"))
        });
        let mut req = DispatchRequest::new(Method::GET, "/");
        let env = run_request_hook(HookStage::OnRequest, &hook, &mut req)
            .unwrap_err()
            .to_envelope();
        assert_eq!(env.code, ErrorCode::HookOnRequestFailed);
        assert_eq!(env.details.unwrap()["message"], "denied");
    }
}
