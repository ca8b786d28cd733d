use std::fmt;

use serde::Serialize;

use crate::error::ErrorCode;

/// The five hook points of the request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HookStage {
    OnRequest,
    PreValidation,
    PreHandler,
    OnError,
    OnResponse,
}

impl HookStage {
    pub const ALL: [HookStage; 5] = [
        HookStage::OnRequest,
        HookStage::PreValidation,
        HookStage::PreHandler,
        HookStage::OnError,
        HookStage::OnResponse,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HookStage::OnRequest => "onRequest",
            HookStage::PreValidation => "preValidation",
            HookStage::PreHandler => "preHandler",
            HookStage::OnError => "onError",
            HookStage::OnResponse => "onResponse",
        }
    }

    /// Error code reported when a hook at this stage fails
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            HookStage::OnRequest => ErrorCode::HookOnRequestFailed,
            HookStage::PreValidation => ErrorCode::HookPreValidationFailed,
            HookStage::PreHandler => ErrorCode::HookPreHandlerFailed,
            HookStage::OnError => ErrorCode::HookOnErrorFailed,
            HookStage::OnResponse => ErrorCode::HookOnResponseFailed,
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a single dispatch currently is.
///
/// ```text
/// Created -> Requested -> Validating -> Handling -> Responding -> Done
///                \____________\_____________\__________> Error -> Responding
/// ```
///
/// A short-circuit from any request-side hook jumps straight to `Responding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Created,
    Requested,
    Validating,
    Handling,
    Responding,
    Error,
    Done,
}

impl PipelineState {
    #[must_use]
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Created, Requested)
                | (Created, Error)
                | (Requested, Validating)
                | (Requested, Responding)
                | (Requested, Error)
                | (Validating, Handling)
                | (Validating, Responding)
                | (Validating, Error)
                | (Handling, Responding)
                | (Handling, Error)
                | (Error, Responding)
                | (Responding, Done)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == PipelineState::Done
    }
}

/// Records the state walk of one dispatch for tracing.
#[derive(Debug, Clone)]
pub struct PipelineTrace {
    state: PipelineState,
    visited: Vec<PipelineState>,
}

impl PipelineTrace {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PipelineState::Created,
            visited: vec![PipelineState::Created],
        }
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    #[must_use]
    pub fn visited(&self) -> &[PipelineState] {
        &self.visited
    }

    /// Move to `next`; an illegal move is logged and still applied so a
    /// response is always produced.
    pub fn advance(&mut self, next: PipelineState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = ?self.state, to = ?next, "Unexpected pipeline transition");
        }
        self.state = next;
        self.visited.push(next);
    }
}

impl Default for PipelineTrace {
    fn default() -> Self {
        Self::new()
    }
}
