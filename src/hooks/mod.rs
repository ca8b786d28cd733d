//! # Lifecycle Hooks Module
//!
//! Optional callbacks at five points of every dispatch:
//!
//! | Stage           | Runs                                  | May            |
//! |-----------------|---------------------------------------|----------------|
//! | `onRequest`     | before route matching                 | rewrite, stop  |
//! | `preValidation` | after matching, before param checks   | rewrite, stop  |
//! | `preHandler`    | after validation, before the handler  | rewrite, stop  |
//! | `onError`       | when an error envelope was produced   | replace        |
//! | `onResponse`    | on every final response               | replace        |
//!
//! Each hook returns a [`HookResult`]: `Continue` or `ShortCircuit(response)`.
//! A hook that fails (returns `Err` or panics) fails its stage with the
//! matching `hook_<stage>_failed` code. Failures inside `onError` fall back
//! to the envelope of the original error.
//!
//! ## Example
//!
//! ```
//! use switchyard::dispatcher::DispatchResponse;
//! use switchyard::hooks::{HookResult, LifecycleHooks};
//! use serde_json::json;
//!
//! let hooks = LifecycleHooks::new()
//!     .on_request(|req| {
//!         if req.get_header("x-maintenance").is_some() {
//!             return Ok(HookResult::short_circuit(DispatchResponse::json(
//!                 503,
//!                 json!({"error": "maintenance"}),
//!             )));
//!         }
//!         Ok(HookResult::Continue)
//!     })
//!     .on_response(|_req, _resp| Ok(HookResult::Continue));
//!
//! assert!(!hooks.is_empty());
//! ```

mod core;
mod dynamic;
mod pipeline;

pub use self::core::{ErrorHook, HookError, HookResult, LifecycleHooks, RequestHook, ResponseHook};
pub(crate) use self::core::{run_error_hook, run_request_hook, run_response_hook};
pub use dynamic::{dynamic_error_hook, dynamic_request_hook, dynamic_response_hook, fixed_request_hook};
pub use pipeline::{HookStage, PipelineState, PipelineTrace};
