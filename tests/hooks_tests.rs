//! Lifecycle hook pipeline tests
//!
//! Covers stage ordering, short-circuiting, request rewriting, hook failure
//! codes, the onError fallback and dynamic (JSON-valued) hooks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use switchyard::dispatcher::DispatchResponse;
use switchyard::hooks::{dynamic_request_hook, fixed_request_hook, HookError, HookResult, HookStage, LifecycleHooks};
use switchyard::{ErrorCode, ParamSpec, RouteDescriptor, RouteRegistry, HandlerRef};

mod common;
use common::fixtures::{builder, get};

fn counting_routes(calls: Arc<AtomicUsize>) -> RouteRegistry {
    let mut routes = RouteRegistry::new();
    routes
        .route_fn("GET", "/thing", move |_req, _deps| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(DispatchResponse::ok(json!({"thing": true})))
        })
        .unwrap();
    routes
}

#[test]
fn test_hooks_run_in_order() {
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let (a, b, c, d) = (Arc::clone(&log), Arc::clone(&log), Arc::clone(&log), Arc::clone(&log));

    let hooks = LifecycleHooks::new()
        .on_request(move |_req| {
            a.lock().unwrap().push("onRequest");
            Ok(HookResult::Continue)
        })
        .pre_validation(move |_req| {
            b.lock().unwrap().push("preValidation");
            Ok(HookResult::Continue)
        })
        .pre_handler(move |_req| {
            c.lock().unwrap().push("preHandler");
            Ok(HookResult::Continue)
        })
        .on_response(move |_req, _resp| {
            d.lock().unwrap().push("onResponse");
            Ok(HookResult::Continue)
        });

    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = builder(counting_routes(Arc::clone(&calls)))
        .with_hooks(hooks)
        .build()
        .unwrap();

    let resp = dispatcher.dispatch(get("/thing"));
    assert_eq!(resp.status, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["onRequest", "preValidation", "preHandler", "onResponse"]
    );
}

#[test]
fn test_on_request_short_circuit_skips_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let hooks = LifecycleHooks::new().on_request(|_req| {
        Ok(HookResult::short_circuit(DispatchResponse::json(
            418,
            json!({"tea": "earl grey"}),
        )))
    });
    let dispatcher = builder(counting_routes(Arc::clone(&calls)))
        .with_hooks(hooks)
        .build()
        .unwrap();

    let resp = dispatcher.dispatch(get("/thing"));
    assert_eq!(resp.status, 418);
    assert_eq!(resp.body["tea"], "earl grey");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_short_circuit_still_passes_through_on_response() {
    let hooks = LifecycleHooks::new()
        .pre_handler(|_req| Ok(HookResult::short_circuit(DispatchResponse::status(401))))
        .on_response(|_req, resp| {
            Ok(HookResult::short_circuit(
                resp.clone().with_header("x-seen-by", "onResponse"),
            ))
        });
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = builder(counting_routes(Arc::clone(&calls)))
        .with_hooks(hooks)
        .build()
        .unwrap();

    let resp = dispatcher.dispatch(get("/thing"));
    assert_eq!(resp.status, 401);
    assert_eq!(resp.get_header("x-seen-by"), Some("onResponse"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_on_request_can_rewrite_path() {
    let hooks = LifecycleHooks::new().on_request(|req| {
        if req.path == "/legacy/thing" {
            req.path = "/thing".to_string();
        }
        Ok(HookResult::Continue)
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = builder(counting_routes(Arc::clone(&calls)))
        .with_hooks(hooks)
        .build()
        .unwrap();

    assert_eq!(dispatcher.dispatch(get("/legacy/thing")).status, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_pre_validation_can_inject_missing_input() {
    let mut routes = RouteRegistry::new();
    routes
        .register(
            RouteDescriptor::new(
                "GET",
                "/secure",
                HandlerRef::Inline(switchyard::dispatcher::handler_fn(|req, _deps| {
                    Ok(DispatchResponse::ok(json!({"token": req.param("x-token")})))
                })),
            )
            .unwrap()
            .with_param(ParamSpec::header("x_token")),
        )
        .unwrap();
    let hooks = LifecycleHooks::new().pre_validation(|req| {
        if req.get_header("x-token").is_none() {
            *req = req.clone().with_header("X-Token", "injected");
        }
        Ok(HookResult::Continue)
    });
    let dispatcher = builder(routes).with_hooks(hooks).build().unwrap();

    let resp = dispatcher.dispatch(get("/secure"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["token"], "injected");
}

#[test]
fn test_hook_failures_use_stage_codes() {
    let cases: Vec<(HookStage, LifecycleHooks, &str)> = vec![
        (
            HookStage::OnRequest,
            LifecycleHooks::new().on_request(|_req| Err(HookError::new("nope"))),
            "hook_on_request_failed",
        ),
        (
            HookStage::PreValidation,
            LifecycleHooks::new().pre_validation(|_req| Err("bad input".into())),
            "hook_pre_validation_failed",
        ),
        (
            HookStage::PreHandler,
            LifecycleHooks::new().pre_handler(|_req| -> Result<HookResult, HookError> {
                panic!("pre handler exploded")
            }),
            "hook_pre_handler_failed",
        ),
    ];

    for (stage, hooks, code) in cases {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = builder(counting_routes(Arc::clone(&calls)))
            .with_hooks(hooks)
            .build()
            .unwrap();
        let resp = dispatcher.dispatch(get("/thing"));
        assert_eq!(resp.status, 500, "{stage}");
        assert_eq!(resp.body["code"], code, "{stage}");
        assert_eq!(resp.body["details"]["stage"], stage.as_str());
        assert!(resp.body["details"]["message"].is_string());
        assert_eq!(calls.load(Ordering::SeqCst), 0, "{stage}");
    }
}

#[test]
fn test_on_error_can_replace_error_response() {
    let hooks = LifecycleHooks::new().on_error(|_req, envelope| {
        Ok(HookResult::short_circuit(DispatchResponse::json(
            404,
            json!({"friendly": format!("nothing here ({})", envelope.code)}),
        )))
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = builder(counting_routes(calls)).with_hooks(hooks).build().unwrap();

    let resp = dispatcher.dispatch(get("/missing"));
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body["friendly"], "nothing here (route_not_found)");
}

#[test]
fn test_failing_on_error_falls_back_to_original_envelope() {
    let hooks = LifecycleHooks::new().on_error(|_req, _envelope| Err(HookError::new("onError broke")));
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = builder(counting_routes(calls)).with_hooks(hooks).build().unwrap();

    let resp = dispatcher.dispatch(get("/missing"));
    assert_eq!(resp.status, 404);
    assert_eq!(resp.envelope.unwrap().code, ErrorCode::RouteNotFound);
}

#[test]
fn test_failing_on_response_replaces_response() {
    let hooks = LifecycleHooks::new().on_response(|_req, _resp| Err(HookError::new("late failure")));
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = builder(counting_routes(Arc::clone(&calls)))
        .with_hooks(hooks)
        .build()
        .unwrap();

    let resp = dispatcher.dispatch(get("/thing"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(resp.status, 500);
    assert_eq!(resp.envelope.unwrap().code, ErrorCode::HookOnResponseFailed);
}

#[test]
fn test_dynamic_hook_contract_violation() {
    let hooks = LifecycleHooks::new().with_request_hook(
        HookStage::OnRequest,
        dynamic_request_hook(|_req| json!({"status": "maybe"})),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = builder(counting_routes(Arc::clone(&calls)))
        .with_hooks(hooks)
        .build()
        .unwrap();

    let resp = dispatcher.dispatch(get("/thing"));
    let envelope = resp.envelope.unwrap();
    assert_eq!(envelope.code, ErrorCode::HookOnRequestFailed);
    assert_eq!(envelope.details.unwrap()["value"], json!({"status": "maybe"}));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dynamic_hook_short_circuit_from_config() {
    let hook = fixed_request_hook(json!({
        "short_circuit": {"status": 503, "headers": {"retry-after": "30"}, "body": {"error": "maintenance"}}
    }))
    .unwrap();
    let hooks = LifecycleHooks::new().with_request_hook(HookStage::OnRequest, hook);
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = builder(counting_routes(Arc::clone(&calls)))
        .with_hooks(hooks)
        .build()
        .unwrap();

    let resp = dispatcher.dispatch(get("/thing"));
    assert_eq!(resp.status, 503);
    assert_eq!(resp.get_header("retry-after"), Some("30"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_hook_result_equality() {
    assert_eq!(HookResult::continue_(), HookResult::Continue);
    assert_ne!(
        HookResult::short_circuit(DispatchResponse::status(200)),
        HookResult::short_circuit(DispatchResponse::status(201))
    );
    assert!(HookResult::short_circuit(DispatchResponse::status(204)).is_short_circuit());
}

#[test]
fn test_request_hooks_chain_until_short_circuit() {
    let seen = Arc::new(AtomicUsize::new(0));
    let third = Arc::clone(&seen);
    let hooks = LifecycleHooks::new()
        .on_request(|req| {
            req.headers.push((Arc::from("x-first"), "1".to_string()));
            Ok(HookResult::Continue)
        })
        .on_request(|req| {
            if req.get_header("x-first") == Some("1") {
                Ok(HookResult::short_circuit(DispatchResponse::status(403)))
            } else {
                Ok(HookResult::Continue)
            }
        })
        .on_request(move |_req| {
            third.fetch_add(1, Ordering::SeqCst);
            Ok(HookResult::Continue)
        });
    assert_eq!(hooks.count(HookStage::OnRequest), 3);

    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = builder(counting_routes(Arc::clone(&calls)))
        .with_hooks(hooks)
        .build()
        .unwrap();

    let resp = dispatcher.dispatch(get("/thing"));
    assert_eq!(resp.status, 403);
    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_response_hooks_see_previous_replacement() {
    let hooks = LifecycleHooks::new()
        .on_response(|_req, resp| {
            Ok(HookResult::short_circuit(resp.clone().with_header("x-stage", "one")))
        })
        .on_response(|_req, resp| {
            let tagged = format!("{}+two", resp.get_header("x-stage").unwrap_or("none"));
            Ok(HookResult::short_circuit(resp.clone().with_header("x-stage", tagged)))
        })
        .on_response(|_req, _resp| Ok(HookResult::Continue));
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = builder(counting_routes(calls)).with_hooks(hooks).build().unwrap();

    let resp = dispatcher.dispatch(get("/thing"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("x-stage"), Some("one+two"));
    assert_eq!(resp.body, json!({"thing": true}));
}

#[test]
fn test_first_short_circuiting_error_hook_wins() {
    let hooks = LifecycleHooks::new()
        .on_error(|_req, _envelope| Ok(HookResult::Continue))
        .on_error(|_req, _envelope| Ok(HookResult::short_circuit(DispatchResponse::status(410))))
        .on_error(|_req, _envelope| Ok(HookResult::short_circuit(DispatchResponse::status(500))));
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = builder(counting_routes(calls)).with_hooks(hooks).build().unwrap();

    assert_eq!(dispatcher.dispatch(get("/missing")).status, 410);
}
