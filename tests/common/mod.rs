#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};
use switchyard::{Error, Method, ParamSpec, ProxyEvent, Request, Response, Route, Router, params};

/// Counts every time a piece of application code runs.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// The route table most tests dispatch against.
pub fn app(calls: &Calls) -> Router {
    let (on_admin, on_transform, on_body) = (calls.clone(), calls.clone(), calls.clone());
    Router::new()
        .on(Method::Get, "/test/:id", |req: Request| async move {
            Ok::<_, Error>(json!({ "message": format!("Hello world {}", req.param("id").unwrap_or_default()) }))
        })
        .on(Method::Get, "/test/validation/:validated", |_req: Request| async {
            Ok::<_, Error>(json!({ "literal": true }))
        })
        .route(
            Route::new(Method::Get, "/test", move |_req: Request| {
                let calls = on_admin.clone();
                async move {
                    calls.bump();
                    Ok::<_, Error>(json!({ "message": "Hello worldss" }))
                }
            })
            .roles(["ADMIN"])
            .param(ParamSpec::query("tag").transform(move |v| {
                on_transform.bump();
                Ok(v)
            })),
        )
        .route(
            Route::new(Method::Post, "/test-body", move |req: Request| {
                let calls = on_body.clone();
                async move {
                    calls.bump();
                    Ok::<_, Error>(json!({ "user": req.arg(0) }))
                }
            })
            .param(ParamSpec::body().required().transform(|body: Value| {
                if body.get("age").is_some_and(Value::is_number) {
                    Ok(body)
                } else {
                    Err(Error::status("Age is required and must be a number", 400))
                }
            })),
        )
        .route(
            Route::new(Method::Get, "/test-query", |req: Request| async move {
                Ok::<_, Error>(json!({ "name": req.arg(0), "age": req.arg(1) }))
            })
            .param(ParamSpec::query("name"))
            .param(ParamSpec::query("age").transform(params::integer)),
        )
        .route(
            Route::new(Method::Get, "/test-all-query", |req: Request| async move {
                Ok::<_, Error>(json!({ "params": req.arg(0) }))
            })
            .param(ParamSpec::query_all()),
        )
        .on(Method::Get, "/error", |_req: Request| async { Err::<Value, _>(Error::msg("Oh no :(")) })
        .on(Method::Put, "/error", |_req: Request| async { Err::<Value, _>(Error::status("You can't :(", 403)) })
}

pub fn get(path: &str) -> ProxyEvent {
    ProxyEvent::new("GET", path)
}

pub fn as_admin(event: ProxyEvent) -> ProxyEvent {
    event.claims(json!({ "cognito:groups": ["ADMIN"] }))
}

/// `(status, parsed body)`.
pub fn parts(res: &Response) -> (u16, Value) {
    (res.status_code(), res.body_json().unwrap())
}
