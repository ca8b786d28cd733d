#![allow(dead_code)]

pub mod temp_files {
    use std::io::Write;

    use tempfile::NamedTempFile;

    /// Write `content` to a temporary file with the given extension.
    ///
    /// The file is removed when the returned handle is dropped.
    pub fn create_temp_file(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("switchyard_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        create_temp_file(content, "yaml")
    }
}

pub mod test_runtime {
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }
}

pub mod fixtures {
    use std::sync::Arc;

    use http::Method;
    use serde_json::json;
    use switchyard::dispatcher::{DispatchRequest, DispatchResponse, Dispatcher};
    use switchyard::router::RouteRegistry;
    use switchyard::{DispatcherBuilder, InlineExecutor};

    pub fn get(path: &str) -> DispatchRequest {
        DispatchRequest::new(Method::GET, path)
    }

    pub fn post(path: &str) -> DispatchRequest {
        DispatchRequest::new(Method::POST, path)
    }

    /// Builder preloaded with an inline background executor so tests observe
    /// background work synchronously.
    pub fn builder(routes: RouteRegistry) -> DispatcherBuilder {
        Dispatcher::builder()
            .with_routes(routes)
            .with_background_executor(Arc::new(InlineExecutor))
    }

    /// Registry with one `GET /ping` route answering `{"pong": true}`
    pub fn ping_routes() -> RouteRegistry {
        let mut routes = RouteRegistry::new();
        routes
            .route_fn("GET", "/ping", |_req, _deps| {
                Ok(DispatchResponse::ok(json!({"pong": true})))
            })
            .unwrap();
        routes
    }
}
