//! The function-runtime build: same dispatcher, fed by the Lambda runtime API
//! instead of a local listener.
//!
//! ```sh
//! cargo lambda watch --example lambda
//! cargo lambda invoke --data-ascii '{"httpMethod":"GET","path":"/test/42"}'
//! cargo lambda invoke --data-ascii '{"action":"rpcMethod","payload":{"x":1}}'
//! ```

use serde_json::{Value, json};
use switchyard::{Config, Dispatcher, Error, Method, ParamSpec, Request, Route, Router, lambda, middleware, params};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .without_time()
        .init();

    let router = Router::new()
        .route(Route::new(Method::Get, "/test", admin_only).roles(["ADMIN"]))
        .on(Method::Get, "/test/:id", get_test)
        .route(
            Route::new(Method::Get, "/test-errors/:code", error_codes)
                .param(ParamSpec::path("code").transform(params::integer)),
        )
        .rpc("rpcMethod", rpc_method)
        .fallback(|req: Request| async move {
            info!(event = ?req.arg(0), "unrouted event");
            Ok::<_, Error>(json!({ "handled": false }))
        });

    let dispatcher = Dispatcher::builder()
        .config(Config::from_env())
        .middleware(middleware::from_fn("invocation log", |ctx| {
            info!(route = ?ctx.route(), "invocation");
            Ok(())
        }))
        .build(router);

    lambda::run(dispatcher).await
}

async fn admin_only(_req: Request) -> Result<Value, Error> {
    Ok(json!({ "message": "Hello worldss" }))
}

async fn get_test(req: Request) -> Result<Value, Error> {
    Ok(json!({ "message": format!("Hello world {}", req.param("id").unwrap_or_default()) }))
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
