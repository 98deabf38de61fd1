//! # switchyard
//!
//! Request dispatch for a single serverless function that serves many HTTP
//! routes. One function, one entry point, many handlers.
//!
//! ## What it does
//!
//! - Routing: `(method, path)` resolved against patterns with `:name`
//!   placeholders; the most literal pattern wins
//! - Access control: per-route role allow-lists checked before any handler
//!   code runs
//! - Parameter binding: path, query and body values bound to positional
//!   handler arguments, each with an optional transform and validation
//! - Middleware: setup/teardown pairs around every dispatch, torn down in
//!   reverse even when something fails
//! - Error translation: every failure becomes `{"errorMessage": …}` with
//!   the right status code
//!
//! Beyond HTTP, the same dispatcher answers `{action, payload}` RPC calls and
//! hands any other event shape to a fallback handler. [`Server`] runs it
//! locally over real HTTP.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde_json::{Value, json};
//! use switchyard::{Dispatcher, Error, Method, ParamSpec, Request, Route, Router, Server, params};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let router = Router::new()
//!         .on(Method::Get, "/test/:id", get_test)
//!         .route(
//!             Route::new(Method::Get, "/test-query", search)
//!                 .param(ParamSpec::query("age").transform(params::integer)),
//!         )
//!         .route(Route::new(Method::Get, "/admin", get_test).roles(["ADMIN"]));
//!
//!     Server::bind("0.0.0.0:3000").serve(Dispatcher::new(router)).await
//! }
//!
//! async fn get_test(req: Request) -> Result<Value, Error> {
//!     Ok(json!({ "id": req.param("id") }))
//! }
//!
//! async fn search(req: Request) -> Result<Value, Error> {
//!     let age: Option<i64> = req.extract(0)?;
//!     Ok(json!({ "age": age }))
//! }
//! ```
//!
//! In a function runtime, build the [`Dispatcher`] once and pass it to
//! [`lambda::run`], which hands every invocation payload to
//! [`Dispatcher::invoke`].

mod config;
mod context;
mod dispatcher;
mod error;
mod event;
mod guard;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod lambda;
pub mod middleware;
pub mod params;

pub use config::Config;
pub use context::Context;
pub use dispatcher::{Builder, Dispatcher};
pub use error::{Error, ErrorKind, Result};
pub use event::{Event, ProxyEvent, RpcEvent};
pub use guard::{ClaimRoles, RoleClaims, authorize};
pub use handler::{BoxFuture, Handler, IntoReply};
pub use method::{Method, UnknownMethod};
pub use middleware::{Middleware, Pipeline};
pub use params::{ParamSpec, Source};
pub use request::Request;
pub use response::{Response, ResponseBuilder};
pub use router::{Resolved, Route, RouteInfo, Router};
pub use server::{DEFAULT_BODY_LIMIT, Server};
