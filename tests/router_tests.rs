use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use serde_json::json;
use switchyard::dispatcher::{handler_fn, DispatchResponse, Handler};
use switchyard::router::{CompiledRoutes, HandlerRef, RouteDescriptor, RouteRegistry};
use switchyard::{DuplicatePolicy, ErrorCode};

fn answer(tag: &'static str) -> HandlerRef {
    HandlerRef::Inline(handler_fn(move |_req, _deps| {
        Ok(DispatchResponse::ok(json!({ "tag": tag })))
    }))
}

fn compile(routes: &RouteRegistry) -> CompiledRoutes {
    CompiledRoutes::compile(routes, &HashMap::new()).unwrap()
}

#[test]
fn test_reregistration_is_last_write_wins() {
    let mut routes = RouteRegistry::new();
    routes
        .route("GET", "/a", answer("a1"))
        .unwrap()
        .route("GET", "/b", answer("b"))
        .unwrap()
        .route("get", "/a", answer("a2"))
        .unwrap();

    assert_eq!(routes.len(), 2);
    let paths: Vec<String> = routes.snapshot().iter().map(|r| r.path.clone()).collect();
    assert_eq!(paths, vec!["/a", "/b"]);

    let compiled = compile(&routes);
    let m = compiled.match_route(&Method::GET, "/a").unwrap();
    let resp = m
        .handler
        .handle(&switchyard::DispatchRequest::new(Method::GET, "/a"), &Default::default())
        .unwrap();
    assert_eq!(resp.body["tag"], "a2");
}

#[test]
fn test_reject_policy_refuses_duplicates() {
    let mut routes = RouteRegistry::with_policy(DuplicatePolicy::Reject);
    routes.route("POST", "/items", answer("first")).unwrap();
    let err = routes.route("POST", "/items", answer("second")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert!(err.to_string().contains("POST /items"));
    assert_eq!(routes.len(), 1);
}

#[test]
fn test_same_path_different_methods_are_distinct() {
    let mut routes = RouteRegistry::with_policy(DuplicatePolicy::Reject);
    routes
        .route("GET", "/items", answer("list"))
        .unwrap()
        .route("POST", "/items", answer("create"))
        .unwrap();
    assert_eq!(routes.len(), 2);

    let compiled = compile(&routes);
    assert!(compiled.match_route(&Method::POST, "/items").is_some());
    assert!(compiled.match_route(&Method::DELETE, "/items").is_none());
    assert!(compiled.path_exists("/items"));
}

#[test]
fn test_first_registered_route_wins_on_overlap() {
    let mut routes = RouteRegistry::new();
    routes
        .route("GET", "/users/me", answer("me"))
        .unwrap()
        .route("GET", "/users/{id}", answer("by-id"))
        .unwrap();

    let compiled = compile(&routes);
    let me = compiled.match_route(&Method::GET, "/users/me").unwrap();
    assert_eq!(me.route.path, "/users/me");
    assert!(me.path_params.is_empty());

    let other = compiled.match_route(&Method::GET, "/users/42?verbose=1").unwrap();
    assert_eq!(other.route.path, "/users/{id}");
    assert_eq!(other.get_path_param("id"), Some("42"));
}

#[test]
fn test_catch_all_path_parameter() {
    let mut routes = RouteRegistry::new();
    routes.route("GET", "/files/{rest:path}", answer("files")).unwrap();

    let compiled = compile(&routes);
    let m = compiled.match_route(&Method::GET, "/files/a/b/c.txt").unwrap();
    assert_eq!(m.get_path_param("rest"), Some("a/b/c.txt"));
    assert!(compiled.match_route(&Method::GET, "/files/").is_none());
}

#[test]
fn test_named_handlers_resolve_at_compile_time() {
    let mut routes = RouteRegistry::new();
    routes.route("GET", "/health", HandlerRef::named("health")).unwrap();

    let mut handlers: HashMap<String, Arc<dyn Handler>> = HashMap::new();
    handlers.insert(
        "health".to_string(),
        handler_fn(|_req, _deps| Ok(DispatchResponse::ok(json!({"ok": true})))),
    );
    let compiled = CompiledRoutes::compile(&routes, &handlers).unwrap();
    assert_eq!(compiled.len(), 1);

    let err = CompiledRoutes::compile(&routes, &HashMap::new()).err().unwrap();
    assert_eq!(err.code(), ErrorCode::HandlerNotCallable);
}

#[test]
fn test_route_payload_shape() {
    let mut routes = RouteRegistry::new();
    routes
        .register(
            RouteDescriptor::new("PUT", "/pets/{id}", HandlerRef::named("update_pet"))
                .unwrap()
                .with_response_schema(json!({"type": "object"}))
                .with_dependencies(["db"]),
        )
        .unwrap();

    let payload = routes.get("put", "/pets/{id}").unwrap().to_payload();
    assert_eq!(payload["method"], "PUT");
    assert_eq!(payload["path"], "/pets/{id}");
    assert_eq!(payload["handler_name"], "update_pet");
    assert_eq!(payload["dependencies"], json!(["db"]));
    assert_eq!(payload["response_schema"], json!({"type": "object"}));
    assert_eq!(payload["parameter_schema"]["properties"]["id"]["source"], "path");
    assert!(payload["request_schema"].is_null());
    assert!(payload["jsonrpc_method"].is_null());
}

#[test]
fn test_descriptor_rejects_bad_input() {
    assert_eq!(
        RouteDescriptor::new("GET", "", HandlerRef::named("x")).unwrap_err().code(),
        ErrorCode::InvalidArgument
    );
    assert_eq!(
        RouteDescriptor::new("NOT A METHOD", "/x", HandlerRef::named("x"))
            .unwrap_err()
            .code(),
        ErrorCode::InvalidArgument
    );
    let rooted = RouteDescriptor::new("GET", "relative", HandlerRef::named("x")).unwrap();
    assert_eq!(rooted.path, "/relative");
}
