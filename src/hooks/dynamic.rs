//! Hooks written against plain JSON values.
//!
//! Embedders that cannot construct [`HookResult`] directly (scripted hooks,
//! hooks loaded from configuration) return a `serde_json::Value` instead:
//!
//! - `"continue"`, `{"continue": true}` or `null` keep going
//! - `{"short_circuit": {"status": 503, "headers": {..}, "body": ..}}` stops
//!   the pipeline with that response
//!
//! Anything else is a contract violation and fails the stage with the
//! offending value in `details.value`.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::dispatcher::{DispatchRequest, DispatchResponse, HeaderVec};
use crate::error::ErrorEnvelope;

use super::core::{ErrorHook, HookError, HookResult, RequestHook, ResponseHook};

impl HookResult {
    /// Interpret a JSON value returned by a dynamic hook.
    pub fn from_value(value: &Value) -> Result<HookResult, HookError> {
        match value {
            Value::Null => Ok(HookResult::Continue),
            Value::String(s) if s == "continue" => Ok(HookResult::Continue),
            Value::Object(obj) => {
                if obj.len() == 1 && obj.get("continue") == Some(&Value::Bool(true)) {
                    return Ok(HookResult::Continue);
                }
                match (obj.len(), obj.get("short_circuit")) {
                    (1, Some(Value::Object(resp))) => response_from_map(resp)
                        .map(HookResult::ShortCircuit)
                        .ok_or_else(|| HookError::contract_violation(value.clone())),
                    _ => Err(HookError::contract_violation(value.clone())),
                }
            }
            other => Err(HookError::contract_violation(other.clone())),
        }
    }

    /// Inverse of [`HookResult::from_value`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            HookResult::Continue => json!({ "continue": true }),
            HookResult::ShortCircuit(resp) => {
                let headers: Map<String, Value> = resp
                    .headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
                    .collect();
                json!({
                    "short_circuit": {
                        "status": resp.status,
                        "headers": headers,
                        "body": resp.body,
                    }
                })
            }
        }
    }
}

fn response_from_map(map: &Map<String, Value>) -> Option<DispatchResponse> {
    let status = match map.get("status") {
        None => 200,
        Some(v) => u16::try_from(v.as_u64()?).ok().filter(|s| (100..=599).contains(s))?,
    };

    let mut headers = HeaderVec::new();
    if let Some(h) = map.get("headers") {
        for (k, v) in h.as_object()? {
            headers.push((Arc::from(k.as_str()), v.as_str()?.to_string()));
        }
    }

    let body = map.get("body").cloned().unwrap_or(Value::Null);
    Some(DispatchResponse::new(status, headers, body))
}

/// Adapt a value-returning closure into a request-side hook.
pub fn dynamic_request_hook<F>(f: F) -> RequestHook
where
    F: Fn(&DispatchRequest) -> Value + Send + Sync + 'static,
{
    Arc::new(move |req: &mut DispatchRequest| HookResult::from_value(&f(req)))
}

pub fn dynamic_error_hook<F>(f: F) -> ErrorHook
where
    F: Fn(&DispatchRequest, &ErrorEnvelope) -> Value + Send + Sync + 'static,
{
    Arc::new(move |req: &DispatchRequest, env: &ErrorEnvelope| HookResult::from_value(&f(req, env)))
}

pub fn dynamic_response_hook<F>(f: F) -> ResponseHook
where
    F: Fn(&DispatchRequest, &DispatchResponse) -> Value + Send + Sync + 'static,
{
    Arc::new(move |req: &DispatchRequest, resp: &DispatchResponse| {
        HookResult::from_value(&f(req, resp))
    })
}

/// A request-side hook that always returns the same configured value.
///
/// The value is checked once up front so a bad configuration fails at
/// setup time instead of on the first request.
pub fn fixed_request_hook(value: Value) -> Result<RequestHook, HookError> {
    let result = HookResult::from_value(&value)?;
    Ok(Arc::new(
        move |_req: &mut DispatchRequest| -> Result<HookResult, HookError> { Ok(result.clone()) },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_forms() {
        assert_eq!(HookResult::from_value(&json!("continue")).unwrap(), HookResult::Continue);
        assert_eq!(HookResult::from_value(&json!({"continue": true})).unwrap(), HookResult::Continue);
        assert_eq!(HookResult::from_value(&Value::Null).unwrap(), HookResult::Continue);
    }

    #[test]
    fn short_circuit_form() {
        let v = json!({"short_circuit": {"status": 418, "headers": {"x-teapot": "yes"}, "body": {"tea": true}}});
        let resp = HookResult::from_value(&v).unwrap().into_response().unwrap();
        assert_eq!(resp.status, 418);
        assert_eq!(resp.get_header("x-teapot"), Some("yes"));
        assert_eq!(resp.body, json!({"tea": true}));
    }

    #[test]
    fn unrecognized_values_are_rejected_with_value() {
        for bad in [json!(42), json!({"continue": false}), json!({"short_circuit": {"status": 9000}})] {
            let err = HookResult::from_value(&bad).unwrap_err();
            assert_eq!(err.value, Some(bad));
        }
    }

    #[test]
    fn fixed_hook_rejects_bad_config() {
        assert!(fixed_request_hook(json!([1, 2])).is_err());
        assert!(fixed_request_hook(json!({"continue": true})).is_ok());
    }
}
