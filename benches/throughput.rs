use std::collections::HashMap;
use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use serde_json::json;
use switchyard::dispatcher::{DispatchRequest, DispatchResponse, Dispatcher};
use switchyard::hooks::{HookResult, LifecycleHooks};
use switchyard::router::{CompiledRoutes, RouteRegistry};
use switchyard::{InlineExecutor, ParamSpec, RouteDescriptor};

const ROUTES: &[(&str, &str)] = &[
    ("GET", "/"),
    ("GET", "/zoo/animals"),
    ("POST", "/zoo/animals"),
    ("GET", "/zoo/animals/{id}"),
    ("PUT", "/zoo/animals/{id}"),
    ("PATCH", "/zoo/animals/{id}"),
    ("DELETE", "/zoo/animals/{id}"),
    ("GET", "/zoo/animals/{id}/toys/{toy_id}"),
    ("GET", "/zoo/{category}/animals/{id}/habitats/{habitat_id}/sections/{section_id}"),
    ("POST", "/inventory/{warehouse_id}/feeds/{feed_id}/items/{item_id}/batches/{batch_id}"),
    ("GET", "/complex/{a}/{b}/{c}/{d}/{e}/{f}/{g}/{h}/{i}"),
    ("HEAD", "/zoo/health"),
    ("OPTIONS", "/zoo/health"),
];

fn zoo_routes() -> RouteRegistry {
    let mut routes = RouteRegistry::new();
    for (method, path) in ROUTES {
        routes
            .route_fn(method, path, |req, _deps| {
                Ok(DispatchResponse::ok(json!({ "path": req.path })))
            })
            .expect("bench route should register");
    }
    routes
}

const PATHS: &[(Method, &str)] = &[
    (Method::GET, "/zoo/animals/123"),
    (Method::GET, "/zoo/animals/123/toys/456"),
    (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
    (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
    (Method::GET, "/complex/1/2/3/4/5/6/7/8/9"),
];

fn bench_route_match(c: &mut Criterion) {
    let compiled =
        CompiledRoutes::compile(&zoo_routes(), &HashMap::new()).expect("bench routes compile");
    c.bench_function("route_match", |b| {
        b.iter(|| {
            for (method, path) in PATHS {
                black_box(compiled.match_route(method, path));
            }
        })
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let dispatcher = Dispatcher::builder()
        .with_routes(zoo_routes())
        .with_background_executor(Arc::new(InlineExecutor))
        .build()
        .expect("bench dispatcher builds");
    c.bench_function("dispatch_plain", |b| {
        b.iter(|| {
            for (method, path) in PATHS {
                black_box(dispatcher.dispatch(DispatchRequest::new(method.clone(), path)));
            }
        })
    });
}

fn bench_dispatch_with_hooks_and_params(c: &mut Criterion) {
    let mut routes = RouteRegistry::new();
    routes
        .register(
            RouteDescriptor::new(
                "GET",
                "/zoo/animals/{id}",
                switchyard::HandlerRef::Inline(switchyard::dispatcher::handler_fn(|req, _deps| {
                    Ok(DispatchResponse::ok(json!({
                        "id": req.param("id"),
                        "limit": req.param("limit"),
                    })))
                })),
            )
            .expect("bench route")
            .with_param(ParamSpec::path("id").with_type("integer"))
            .with_param(
                ParamSpec::query("limit")
                    .with_type("integer")
                    .with_default(json!(10))
                    .expect("bench default"),
            ),
        )
        .expect("bench route registers");

    let hooks = LifecycleHooks::new()
        .on_request(|_req| Ok(HookResult::Continue))
        .pre_handler(|_req| Ok(HookResult::Continue))
        .on_response(|_req, _resp| Ok(HookResult::Continue));

    let dispatcher = Dispatcher::builder()
        .with_routes(routes)
        .with_hooks(hooks)
        .with_background_executor(Arc::new(InlineExecutor))
        .build()
        .expect("bench dispatcher builds");

    c.bench_function("dispatch_hooks_params", |b| {
        b.iter(|| {
            black_box(
                dispatcher.dispatch(DispatchRequest::new(Method::GET, "/zoo/animals/42?limit=5")),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_route_match,
    bench_dispatch,
    bench_dispatch_with_hooks_and_params
);
criterion_main!(benches);
