//! A function with a dozen routes, one RPC action and a fallback, served
//! locally.
//!
//! ```sh
//! cargo run --example basic
//! curl localhost:3000/dev/test/42
//! curl 'localhost:3000/dev/test-query?name=Mario&age=25'
//! curl -X POST localhost:3000/dev/test-body -d '{"name":"Mario","age":25,"email":"m@x.io"}'
//! curl localhost:3000/dev/test                 # 403: ADMIN only
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use switchyard::{Config, Dispatcher, Error, Method, ParamSpec, Request, Route, Router, Server, middleware, params};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dispatcher = Dispatcher::builder()
        .config(Config::from_env())
        .middleware(middleware::from_fn("Middleware 1", |_ctx| {
            info!("Middleware 1");
            Ok(())
        }))
        .middleware(middleware::pair(
            "middleware 2",
            |_ctx| { info!("middleware 2 setup"); Ok(()) },
            |_ctx| { info!("middleware 2 teardown"); Ok(()) },
        ))
        .middleware(middleware::pair("test middleware", stamp, |_ctx| {
            info!("Test middleware teardown");
            Ok(())
        }))
        .build(routes());

    Server::bind("0.0.0.0:3000").stage("dev").serve(dispatcher).await
}

fn routes() -> Router {
    Router::new()
        .route(Route::new(Method::Get, "/test", get_tests).roles(["ADMIN"]))
        .on(Method::Get, "/test/:id", get_test)
        .route(Route::new(Method::Get, "/test/validation/:validated", get_validated).param(ParamSpec::path("validated")))
        .on(Method::Post, "/test", insert_test)
        .on(Method::Get, "/error", generic_error)
        .on(Method::Put, "/error", custom_error)
        .route(Route::new(Method::Post, "/error", forbidden).roles(["NOBODY"]))
        .route(
            Route::new(Method::Get, "/test-query", query_params)
                .param(ParamSpec::query("name"))
                .param(ParamSpec::query("age").transform(params::integer)),
        )
        .route(Route::new(Method::Get, "/test-all-query", all_query_params).param(ParamSpec::query_all()))
        .route(Route::new(Method::Post, "/test-body", create_user).param(ParamSpec::body().required().transform(check_user)))
        .on(Method::Get, "/test-middleware", middleware_data)
        .on(Method::Put, "/test-methods", put_method)
        .route(Route::new(Method::Delete, "/test-methods/:id", delete_method).param(ParamSpec::path("id")))
        .route(
            Route::new(Method::Patch, "/test-methods/:id", patch_method)
                .param(ParamSpec::path("id"))
                .param(ParamSpec::body()),
        )
        .on(Method::Get, "/nested/routes/test", nested)
        .route(
            Route::new(Method::Get, "/test-errors/:code", error_codes)
                .param(ParamSpec::path("code").transform(params::integer)),
        )
        .rpc("rpcMethod", rpc_method)
        .fallback(fallback)
}

fn stamp(ctx: &mut switchyard::Context) -> Result<(), Error> {
    info!("Test middleware setup");
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    ctx.insert("middlewareData", json!({ "timestamp": now.as_millis() as u64 }))
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn get_tests(_req: Request) -> Result<Value, Error> {
    Ok(json!({ "message": "Hello worldss" }))
}

async fn get_test(req: Request) -> Result<Value, Error> {
    let id = req.param("id").unwrap_or_default();
    Ok(json!({ "message": format!("Hello world {id}") }))
}

async fn get_validated(req: Request) -> Result<Value, Error> {
    let validated: String = req.extract(0)?;
    Ok(json!({ "message": format!("Hello world {validated}") }))
}

async fn insert_test(req: Request) -> Result<Value, Error> {
    let body: Value = req.json_body()?;
    tokio::time::sleep(std::time::Duration::from_millis(700)).await;
    Ok(json!({ "exit": "ok", "body": body }))
}

async fn generic_error(_req: Request) -> Result<Value, Error> {
    Err(Error::msg("Oh no :("))
}

async fn custom_error(_req: Request) -> Result<Value, Error> {
    Err(Error::status("You can't :(", 403))
}

async fn forbidden(_req: Request) {
    info!("This should not be logged...");
}

async fn query_params(req: Request) -> Result<Value, Error> {
    let name: Option<String> = req.extract(0)?;
    let age: Option<i64> = req.extract(1)?;
    let name = name.unwrap_or_default();
    let age = age.map(|a| a.to_string()).unwrap_or_default();
    Ok(json!({
        "message": format!("Hello {name}, you are {age} years old"),
        "params": { "name": req.arg(0), "age": req.arg(1) },
    }))
}

async fn all_query_params(req: Request) -> Result<Value, Error> {
    Ok(json!({ "message": "Query parameters received", "params": req.arg(0) }))
}

#[derive(Debug, Serialize, Deserialize)]
struct UserData {
    name: String,
    age: u32,
    email: String,
}

fn check_user(body: Value) -> Result<Value, Error> {
    if !body.get("name").is_some_and(Value::is_string) {
        return Err(Error::status("Name is required and must be a string", 400));
    }
    if !body.get("age").is_some_and(Value::is_number) {
        return Err(Error::status("Age is required and must be a number", 400));
    }
    if !body.get("email").and_then(Value::as_str).is_some_and(|e| e.contains('@')) {
        return Err(Error::status("Valid email is required", 400));
    }
    Ok(body)
}

async fn create_user(req: Request) -> Result<Value, Error> {
    let user: UserData = req.extract(0)?;
    Ok(json!({ "message": format!("User {} created", user.name), "user": user }))
}

async fn middleware_data(req: Request) -> Result<Value, Error> {
    let data = req.context().get("middlewareData").cloned()
        .unwrap_or_else(|| json!("No middleware data found"));
    Ok(json!({ "message": "Middleware test", "middlewareData": data }))
}

async fn put_method(_req: Request) -> Result<Value, Error> {
    Ok(json!({ "method": "PUT", "message": "PUT method handled" }))
}

async fn delete_method(req: Request) -> Result<Value, Error> {
    let id: String = req.extract(0)?;
    Ok(json!({ "method": "DELETE", "message": format!("Resource {id} deleted") }))
}

async fn patch_method(req: Request) -> Result<Value, Error> {
    let id: String = req.extract(0)?;
    Ok(json!({ "method": "PATCH", "message": format!("Resource {id} patched"), "patchData": req.arg(1) }))
}

async fn nested(_req: Request) -> Result<Value, Error> {
    Ok(json!({ "message": "Nested route works" }))
}

async fn error_codes(req: Request) -> Result<Value, Error> {
    let code: i64 = req.extract(0)?;
    if (400..600).contains(&code) {
        return Err(Error::status(format!("Error with code {code}"), code as u16));
    }
    Ok(json!({ "message": format!("No error, code {code} is not an error code") }))
}

async fn rpc_method(req: Request) -> Result<Value, Error> {
    info!(payload = ?req.arg(0), "RPC method called");
    Ok(json!({ "result": "ok" }))
}

async fn fallback(req: Request) -> Result<Value, Error> {
    info!(event = ?req.arg(0), "unrouted event");
    Ok(json!({ "CIAOSSA": req.arg(0) }))
}
